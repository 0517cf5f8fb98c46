use crate::decoding::DecodedMessage;
use std::sync::Arc;

/// A decoded message enriched with some auxiliary data, ready for processing.
///
/// `Incoming` is the input type of message handlers (check out
/// [`Handler`](crate::consumers::Handler)'s docs for more details).
pub struct Incoming<C> {
    /// `context` is a set of resources that are required to process the message and are outside
    /// the lifecycle of the message itself - e.g. an HTTP client for a third-party API.
    ///
    /// The same context is shared by every message the poller processes.
    pub context: Arc<C>,
    /// The decoded payload: a single record or a sequence of records.
    pub message: Arc<DecodedMessage>,
    /// The queue the message was received from.
    pub queue_endpoint: String,
    /// The identifier assigned to the message by the queue.
    pub message_id: String,
    /// How many times the message has been received, this receipt included.
    /// Anything above 1 means a previous attempt did not complete.
    pub receive_count: u32,
}

impl<C> Clone for Incoming<C> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            message: self.message.clone(),
            queue_endpoint: self.queue_endpoint.clone(),
            message_id: self.message_id.clone(),
            receive_count: self.receive_count,
        }
    }
}
