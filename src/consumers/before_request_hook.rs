use std::time::Duration;
use tokio::time::Instant;

/// A hook executed before every receive request a [`QueuePoller`] issues.
///
/// # Use case
///
/// A [`QueuePoller`] keeps long-polling until it has been idle for the configured idle timeout.
/// Before-request hooks let you bound the lifetime of the polling loop in other ways: they look
/// at the [`PollStats`] collected so far and decide whether another request should be issued.
///
/// Hooks are checked in the order they were registered; the first one returning
/// [`PollControl::Stop`] ends the polling loop. The check happens before the request is issued:
/// a batch that has already been received is always processed in full.
///
/// Closures of the form `Fn(&PollStats) -> PollControl` are hooks too.
///
/// Check out [`hooks::before_request`] for ready-made implementations.
///
/// [`QueuePoller`]: crate::consumers::QueuePoller
/// [`hooks::before_request`]: crate::consumers::hooks::before_request
pub trait BeforeRequestHook: Send + Sync + 'static {
    fn before_request(&self, stats: &PollStats) -> PollControl;
}

/// assert it's object safe
type _CHECK = Box<dyn BeforeRequestHook>;

impl<F> BeforeRequestHook for F
where
    F: Fn(&PollStats) -> PollControl + Send + Sync + 'static,
{
    fn before_request(&self, stats: &PollStats) -> PollControl {
        (self)(stats)
    }
}

/// Whether the polling loop should issue another receive request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

/// Running statistics of a single `poll` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollStats {
    /// The number of receive requests issued so far.
    pub request_count: usize,
    /// The number of messages received so far, across all batches.
    pub received_message_count: usize,
    /// The number of messages handled successfully (and deleted).
    pub handled_message_count: usize,
    /// The number of messages whose processing failed (and were left on the queue).
    pub failed_message_count: usize,
    /// When polling started.
    pub polling_started_at: Instant,
    /// When the last non-empty batch was received, if any.
    pub last_message_received_at: Option<Instant>,
}

impl PollStats {
    pub(crate) fn new(polling_started_at: Instant) -> Self {
        Self {
            request_count: 0,
            received_message_count: 0,
            handled_message_count: 0,
            failed_message_count: 0,
            polling_started_at,
            last_message_received_at: None,
        }
    }

    /// How long the poller has gone without receiving a message, as of `now`.
    pub fn idle_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(
            self.last_message_received_at
                .unwrap_or(self.polling_started_at),
        )
    }
}
