//! The contract between the poller and the queue transport.
//!
//! `queue-poller` does not talk to any queue service directly: it drives a [`QueueClient`],
//! which owns the network protocol, authentication and the retry/backoff policy for transport
//! errors.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

mod memory;

pub use memory::InMemoryQueue;

/// A message as handed out by the queue, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// The identifier assigned to the message by the queue.
    pub message_id: String,
    /// The handle required to delete this specific receipt of the message.
    ///
    /// A message that becomes visible again after a failed attempt is handed out with a new
    /// receipt handle.
    pub receipt_handle: String,
    /// The raw message body - a JSON envelope, see [`Envelope`](crate::decoding::Envelope).
    pub body: String,
    /// How many times the message has been received, this receipt included.
    pub receive_count: u32,
}

/// The parameters of a single long-polling receive call.
#[derive(Debug, Clone, Copy)]
pub struct ReceiveRequest<'a> {
    /// The queue to receive from.
    pub endpoint: &'a str,
    /// The largest batch the client should return.
    pub max_messages: usize,
    /// How long the call may wait for a message before returning an empty batch.
    pub wait_time: Duration,
    /// Transport-level options, passed through verbatim from
    /// [`PollerConfig::extra_options`](crate::consumers::PollerConfig::extra_options).
    pub options: &'a BTreeMap<String, serde_json::Value>,
}

/// A client for a queue that hands out batches of messages and expects them to be deleted
/// explicitly once processed.
///
/// # Deletion
///
/// Implementers must never delete (or otherwise acknowledge) messages on their own.
/// The poller calls [`QueueClient::delete`] after a message has been handled successfully;
/// a message that was not deleted must become eligible for redelivery according to the queue's
/// own visibility policy.
#[async_trait::async_trait]
pub trait QueueClient: Send + Sync + 'static {
    /// Receive up to `request.max_messages` messages, waiting at most `request.wait_time`.
    ///
    /// An empty batch means no message arrived within the wait time.
    async fn receive(&self, request: ReceiveRequest<'_>) -> Result<Vec<RawMessage>, anyhow::Error>;

    /// Delete a message, so that it is never delivered again.
    async fn delete(&self, endpoint: &str, message: &RawMessage) -> Result<(), anyhow::Error>;
}

/// assert it's object safe
type _CHECK = Box<dyn QueueClient>;

#[async_trait::async_trait]
impl<Q> QueueClient for Arc<Q>
where
    Q: QueueClient + ?Sized,
{
    async fn receive(&self, request: ReceiveRequest<'_>) -> Result<Vec<RawMessage>, anyhow::Error> {
        Q::receive(self, request).await
    }

    async fn delete(&self, endpoint: &str, message: &RawMessage) -> Result<(), anyhow::Error> {
        Q::delete(self, endpoint, message).await
    }
}
