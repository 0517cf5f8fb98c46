//! A collection of before-request hooks.
use crate::consumers::{BeforeRequestHook, PollControl, PollStats};
use std::num::NonZeroUsize;

/// Stop issuing receive requests once the number of received messages reaches the limit.
///
/// The limit is checked before each request, so the batch that crosses it is still processed
/// in full: a poller limited to 5 messages that receives batches of 3 processes 6 messages.
///
/// [`QueuePollerBuilder`](crate::consumers::QueuePollerBuilder) registers this hook on your
/// behalf when [`PollerConfig::max_messages`](crate::consumers::PollerConfig::max_messages) is set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxMessages(pub NonZeroUsize);

impl BeforeRequestHook for MaxMessages {
    fn before_request(&self, stats: &PollStats) -> PollControl {
        if stats.received_message_count >= self.0.get() {
            PollControl::Stop
        } else {
            PollControl::Continue
        }
    }
}
