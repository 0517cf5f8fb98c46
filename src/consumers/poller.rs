use crate::consumers::{
    builders::QueuePollerBuilder,
    error::ErrorChain,
    extensions::with_extensions,
    BeforeRequestHook, FailedPayload, Handler, Incoming, Notifier, PollControl, PollStats,
    PollerConfig, PollerError, ProcessingError, ResourceScope,
};
use crate::decoding::decode;
use crate::queue::{QueueClient, RawMessage, ReceiveRequest};
use futures_util::FutureExt;
use shutdown_handler::ShutdownHandler;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use task_local_extensions::Extensions;
use tokio::time::Instant;
use tracing::Level;

/// A long-polling consumer for a single queue.
///
/// Every `poll` invocation repeatedly receives batches of messages, decodes each of them
/// according to the configured [`Format`](crate::decoding::Format), hands them over to the
/// handler and deletes the ones that were handled successfully.
///
/// # Failure isolation
///
/// A message that fails to decode, or whose handler returns an error (or panics), is not deleted:
/// the failure is logged, reported to the [`Notifier`] together with the offending payload, and
/// the poller moves on to the next message. Only transport errors - a failed receive or delete -
/// abort `poll`.
///
/// # Termination
///
/// `poll` returns when:
/// - no message has been received for [`PollerConfig::idle_timeout_seconds`];
/// - a [`BeforeRequestHook`] (e.g. the one enforcing [`PollerConfig::max_messages`]) vetoes the
///   next receive request;
/// - the shutdown signal passed to [`QueuePoller::poll_until_shutdown`] fires.
///
/// Batches are always processed in full: the poller only checks whether it should stop between
/// batches.
///
/// # How do I build a `QueuePoller`?
///
/// Use [`QueuePoller::builder`]: you pass in the configuration, the queue client and the
/// context, optionally register hooks, a notifier and a resource scope, and finalise
/// construction by passing in the handler.
pub struct QueuePoller<Context>
where
    Context: Send + Sync + 'static,
{
    pub(crate) config: PollerConfig,
    pub(crate) client: Arc<dyn QueueClient>,
    pub(crate) context: Arc<Context>,
    pub(crate) handler: Arc<dyn Handler<Context>>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) before_request_hooks: Vec<Arc<dyn BeforeRequestHook>>,
    pub(crate) resource_scope: Option<Arc<dyn ResourceScope>>,
}

/// Why a `poll` invocation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No message was received for the configured idle timeout.
    IdleTimeout,
    /// A before-request hook vetoed the next receive request.
    StoppedByHook,
    /// The shutdown signal fired.
    Shutdown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::StoppedByHook => write!(f, "stopped by a before-request hook"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// The outcome of a `poll` invocation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub stop_reason: StopReason,
    pub stats: PollStats,
}

impl<Context> QueuePoller<Context>
where
    Context: Send + Sync + 'static,
{
    /// Start building a `QueuePoller`.
    ///
    /// The context can be passed as a value or as an `Arc` pointer: if it is already an `Arc`,
    /// it won't be "double-wrapped".
    pub fn builder(
        config: PollerConfig,
        client: impl QueueClient,
        context: impl Into<Arc<Context>>,
    ) -> QueuePollerBuilder<Context> {
        QueuePollerBuilder::new(config, Arc::new(client), context.into())
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// The notifier this poller reports into.
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Poll until the idle timeout or a before-request hook stops the loop.
    pub async fn poll(&self) -> Result<PollSummary, PollerError> {
        self.poll_until_shutdown(std::future::pending()).await
    }

    /// Like [`QueuePoller::poll`], but it also stops when the process receives SIGTERM.
    pub async fn poll_until_sigterm(&self) -> Result<PollSummary, anyhow::Error> {
        let shutdown = ShutdownHandler::sigterm()?;
        Ok(self.poll_until_shutdown(shutdown.wait_for_signal()).await?)
    }

    /// Poll until the idle timeout, a before-request hook or `shutdown` stops the loop.
    ///
    /// `shutdown` is only checked while waiting for a batch: a batch that was already received is
    /// processed in full.
    ///
    /// If a [`ResourceScope`] is configured, it is acquired once, before the first receive
    /// request, and released when `poll_until_shutdown` returns - whether polling succeeded or
    /// not.
    #[tracing::instrument(
        skip_all,
        name = "queue_poll",
        fields(queue_endpoint = %self.config.queue_endpoint, tag = %self.notifier.tag())
    )]
    pub async fn poll_until_shutdown(
        &self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<PollSummary, PollerError> {
        let endpoint = self.config.queue_endpoint.as_str();
        self.notifier
            .log(Level::INFO, &format!("Long-polling for messages on {endpoint}"));

        let mut extensions = Extensions::new();
        if let Some(scope) = &self.resource_scope {
            scope
                .acquire(&mut extensions)
                .await
                .map_err(PollerError::ResourceScope)?;
        }

        let (extensions, outcome) = with_extensions(extensions, self.run_loop(shutdown)).await;
        // Releases the scoped resource, if any.
        drop(extensions);

        let summary = outcome?;
        self.notifier.log(Level::INFO, &self.stop_message(&summary));
        Ok(summary)
    }

    async fn run_loop(
        &self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<PollSummary, PollerError> {
        let shutdown = shutdown.fuse();
        tokio::pin!(shutdown);

        let endpoint = self.config.queue_endpoint.as_str();
        let mut stats = PollStats::new(Instant::now());

        let stop_reason = 'poll_loop: loop {
            if self
                .before_request_hooks
                .iter()
                .any(|hook| hook.before_request(&stats) == PollControl::Stop)
            {
                break 'poll_loop StopReason::StoppedByHook;
            }

            let request = ReceiveRequest {
                endpoint,
                max_messages: self.config.max_batch_size,
                wait_time: self.config.wait_time(),
                options: &self.config.extra_options,
            };

            let batch = tokio::select! {
                // a pending shutdown wins over a batch that is ready at the same time
                biased;

                _ = &mut shutdown => break 'poll_loop StopReason::Shutdown,
                batch = self.client.receive(request) => batch.map_err(|source| {
                    PollerError::Receive {
                        endpoint: endpoint.to_owned(),
                        source,
                    }
                })?,
            };
            stats.request_count += 1;

            if batch.is_empty() {
                if stats.idle_time(Instant::now()) >= self.config.idle_timeout() {
                    break 'poll_loop StopReason::IdleTimeout;
                }
                continue 'poll_loop;
            }

            stats.received_message_count += batch.len();
            stats.last_message_received_at = Some(Instant::now());
            tracing::debug!(batch_size = batch.len(), "Received a batch of messages");

            for message in &batch {
                self.process(message, &mut stats).await?;
            }
        };

        Ok(PollSummary { stop_reason, stats })
    }

    /// Decode, handle and delete a single message.
    ///
    /// Failures to process the message are reported and recorded in `stats`; only a failure to
    /// delete a handled message is returned.
    #[tracing::instrument(
        name = "process_message",
        skip_all,
        fields(message_id = %message.message_id, receive_count = message.receive_count),
        level = tracing::Level::DEBUG
    )]
    async fn process(
        &self,
        message: &RawMessage,
        stats: &mut PollStats,
    ) -> Result<(), PollerError> {
        self.notifier
            .log(Level::INFO, &format!("Received JSON payload: {}", message.body));
        let decoded = match decode(&message.body, &self.config.format) {
            Ok(decoded) => Arc::new(decoded),
            Err(e) => {
                stats.failed_message_count += 1;
                self.report_failure(e.into(), FailedPayload::Raw(&message.body));
                return Ok(());
            }
        };

        let incoming = Incoming {
            context: self.context.clone(),
            message: decoded.clone(),
            queue_endpoint: self.config.queue_endpoint.clone(),
            message_id: message.message_id.clone(),
            receive_count: message.receive_count,
        };

        let outcome = match AssertUnwindSafe(self.handler.handle(incoming))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome.map_err(ProcessingError::from),
            Err(panic) => Err(ProcessingError::Panicked(panic_message(panic))),
        };

        match outcome {
            Ok(()) => {
                self.client
                    .delete(&self.config.queue_endpoint, message)
                    .await
                    .map_err(|source| PollerError::Delete {
                        endpoint: self.config.queue_endpoint.clone(),
                        message_id: message.message_id.clone(),
                        source,
                    })?;
                stats.handled_message_count += 1;
            }
            Err(e) => {
                stats.failed_message_count += 1;
                self.report_failure(e, FailedPayload::Decoded(&decoded));
            }
        }
        Ok(())
    }

    fn report_failure(&self, error: ProcessingError, payload: FailedPayload<'_>) {
        self.notifier.log(Level::ERROR, &format!("Exception: {error}"));
        self.notifier
            .log(Level::ERROR, &ErrorChain(&error).to_string());
        let label = format!("{} failed to process message", self.handler.name());
        self.notifier.report_error(&error, &label, payload);
    }

    fn stop_message(&self, summary: &PollSummary) -> String {
        let endpoint = &self.config.queue_endpoint;
        let received = summary.stats.received_message_count;
        match summary.stop_reason {
            StopReason::IdleTimeout => format!(
                "Stopped polling {endpoint}: no messages received for {} seconds \
                 ({received} messages received)",
                self.config.idle_timeout_seconds
            ),
            reason => {
                format!("Stopped polling {endpoint}: {reason} ({received} messages received)")
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => panic
            .downcast_ref::<&'static str>()
            .map(|message| (*message).to_owned())
            .unwrap_or_else(|| "unknown panic payload".to_owned()),
    }
}
