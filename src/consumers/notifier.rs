//! Logging and error reporting for a poller.
use crate::consumers::error::ErrorChain;
use crate::consumers::ProcessingError;
use crate::decoding::DecodedMessage;
use tracing::Level;
use uuid::Uuid;

/// The payload that was being processed when a failure occurred.
#[derive(Debug, Clone, Copy)]
pub enum FailedPayload<'a> {
    /// The handler failed on a successfully decoded message.
    Decoded(&'a DecodedMessage),
    /// Decoding failed: only the raw body is available.
    Raw(&'a str),
}

impl FailedPayload<'_> {
    /// Render the payload as text: decoded messages are serialized back to JSON.
    pub fn render(&self) -> String {
        match self {
            Self::Decoded(message) => serde_json::to_string(message)
                .unwrap_or_else(|e| format!("<payload could not be serialized: {e}>")),
            Self::Raw(body) => (*body).to_owned(),
        }
    }
}

/// A sink for the log lines and failure reports of a [`QueuePoller`].
///
/// A notifier is created once, at process start, and shared by reference with every poller that
/// should report into it. Its [`tag`](Notifier::tag) is a correlation identifier attached to
/// everything it emits.
///
/// [`QueuePoller`]: crate::consumers::QueuePoller
pub trait Notifier: Send + Sync + 'static {
    /// The correlation identifier attached to every log line.
    fn tag(&self) -> &str;

    fn log(&self, level: Level, text: &str);

    /// Report the failure to process a message.
    ///
    /// `context_label` identifies who failed, e.g. `OrdersHandler failed to process message`.
    fn report_error(
        &self,
        error: &ProcessingError,
        context_label: &str,
        payload: FailedPayload<'_>,
    );
}

/// assert it's object safe
type _CHECK = Box<dyn Notifier>;

/// A [`Notifier`] emitting `tracing` events, each carrying a `tag` field.
#[derive(Debug, Clone)]
pub struct TracingNotifier {
    tag: String,
}

impl TracingNotifier {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// Tag every event with `poller_<random uuid>`.
    pub fn with_random_tag() -> Self {
        Self::new(format!("poller_{}", Uuid::new_v4()))
    }
}

impl Default for TracingNotifier {
    fn default() -> Self {
        Self::with_random_tag()
    }
}

impl Notifier for TracingNotifier {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn log(&self, level: Level, text: &str) {
        let tag = self.tag.as_str();
        match level {
            Level::ERROR => tracing::error!(tag, "{text}"),
            Level::WARN => tracing::warn!(tag, "{text}"),
            Level::INFO => tracing::info!(tag, "{text}"),
            Level::DEBUG => tracing::debug!(tag, "{text}"),
            _ => tracing::trace!(tag, "{text}"),
        }
    }

    fn report_error(
        &self,
        error: &ProcessingError,
        context_label: &str,
        payload: FailedPayload<'_>,
    ) {
        tracing::error!(
            tag = self.tag.as_str(),
            error.message = %error,
            error.details = %ErrorChain(error),
            payload = %payload.render(),
            "{context_label}"
        );
    }
}
