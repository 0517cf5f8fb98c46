//! Configuration values for a [`QueuePoller`](crate::consumers::QueuePoller).
use crate::consumers::PollerError;
use crate::decoding::Format;
use serde::Deserialize;
use serde_aux::field_attributes::{
    deserialize_number_from_string, deserialize_option_number_from_string,
};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_WAIT_TIME_SECONDS: u64 = 10;
const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 20;
const DEFAULT_MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Deserialize, Clone, PartialEq)]
/// Everything a [`QueuePoller`](crate::consumers::QueuePoller) needs to know about the queue it
/// polls and how long it should keep polling.
///
/// Every field but `queue_endpoint` has a default; values you provide take precedence.
/// Numeric fields can be provided as numbers or as strings (e.g. when sourced from
/// environment variables).
///
/// Received messages are never deleted by the queue client on its own: the poller deletes a
/// message explicitly, after it has been handled successfully.
pub struct PollerConfig {
    /// The identifier of the queue to poll, e.g. its URL.
    #[serde(default)]
    pub queue_endpoint: String,
    /// The format of the payload inside each message envelope.
    ///
    /// Unsupported values are accepted here and rejected when a message is decoded.
    #[serde(default)]
    pub format: Format,
    /// Stop issuing receive requests once this many messages have been received.
    /// The poller keeps going until it is idle if left unspecified.
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub max_messages: Option<NonZeroUsize>,
    /// How long a single receive request can wait for a message, in seconds.
    #[serde(
        default = "default_wait_time_seconds",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub wait_time_seconds: u64,
    /// Stop polling after this many seconds without receiving any message.
    #[serde(
        default = "default_idle_timeout_seconds",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub idle_timeout_seconds: u64,
    /// The largest batch requested from the queue in a single receive request.
    #[serde(
        default = "default_max_batch_size",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub max_batch_size: usize,
    /// Hold a single resource (e.g. a pooled connection) for the whole duration of each `poll`.
    /// Requires a [`ResourceScope`](crate::consumers::ResourceScope) to be registered.
    #[serde(default)]
    pub connection_pool_scope: bool,
    /// Transport-level options passed verbatim to the queue client with every receive request.
    #[serde(default)]
    pub extra_options: BTreeMap<String, serde_json::Value>,
}

fn default_wait_time_seconds() -> u64 {
    DEFAULT_WAIT_TIME_SECONDS
}

fn default_idle_timeout_seconds() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECONDS
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

impl PollerConfig {
    /// A configuration for `queue_endpoint` with every other value left to its default.
    pub fn new(queue_endpoint: impl Into<String>) -> Self {
        Self {
            queue_endpoint: queue_endpoint.into(),
            format: Format::default(),
            max_messages: None,
            wait_time_seconds: DEFAULT_WAIT_TIME_SECONDS,
            idle_timeout_seconds: DEFAULT_IDLE_TIMEOUT_SECONDS,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            connection_pool_scope: false,
            extra_options: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: impl Into<Format>) -> Self {
        self.format = format.into();
        self
    }

    #[must_use]
    pub fn with_max_messages(mut self, max_messages: NonZeroUsize) -> Self {
        self.max_messages = Some(max_messages);
        self
    }

    #[must_use]
    pub fn with_wait_time_seconds(mut self, wait_time_seconds: u64) -> Self {
        self.wait_time_seconds = wait_time_seconds;
        self
    }

    #[must_use]
    pub fn with_idle_timeout_seconds(mut self, idle_timeout_seconds: u64) -> Self {
        self.idle_timeout_seconds = idle_timeout_seconds;
        self
    }

    #[must_use]
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    #[must_use]
    pub fn with_connection_pool_scope(mut self, enabled: bool) -> Self {
        self.connection_pool_scope = enabled;
        self
    }

    /// Add a transport-level option, replacing any previous value for `key`.
    #[must_use]
    pub fn with_extra_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_options.insert(key.into(), value);
        self
    }

    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_seconds)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    /// Check the values a poller cannot start without.
    ///
    /// The format is deliberately not checked here: an unsupported format fails each message
    /// at decode time instead.
    pub(crate) fn validate(&self) -> Result<(), PollerError> {
        if self.queue_endpoint.trim().is_empty() {
            return Err(PollerError::InvalidConfiguration(
                "`queue_endpoint` must be set to a non-empty value.".into(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(PollerError::InvalidConfiguration(
                "`max_batch_size` must be at least 1.".into(),
            ));
        }
        if !self.format.is_supported() {
            tracing::warn!(
                queue_endpoint = %self.queue_endpoint,
                "Unknown format `{}`: every message will fail to decode.",
                self.format
            );
        }
        Ok(())
    }
}
