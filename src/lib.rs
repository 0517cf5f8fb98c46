//! `queue-poller` is a long-polling consumer framework for message queues that hand out
//! batches of messages and expect an explicit acknowledgement (delete) once a message has been
//! processed, e.g. SQS queues subscribed to an SNS topic.
//!
//! [`QueuePoller`](crate::consumers::QueuePoller) is the best starting point to learn more
//! about what `queue-poller` provides and how to leverage it.
//!
//! The transport itself is out of scope: bring your own [`QueueClient`](crate::queue::QueueClient)
//! implementation, or use [`InMemoryQueue`](crate::queue::InMemoryQueue) for tests.

pub mod consumers;
pub mod decoding;
pub mod pool;
pub mod queue;
