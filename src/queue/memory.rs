//! An in-process queue with visibility timeouts, for tests and local development.
use crate::queue::{QueueClient, RawMessage, ReceiveRequest};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`QueueClient`] that keeps its queues in memory.
///
/// It mimics the semantics of an SQS-like service:
///
/// - a received message is hidden for the visibility timeout and handed out again, under a new
///   receipt handle, if it is not deleted in time;
/// - `receive` long-polls: it waits up to the requested wait time for a message to show up.
///
/// `InMemoryQueue` is cheap to clone - clones share the same queues.
#[derive(Clone)]
pub struct InMemoryQueue {
    inner: Arc<Inner>,
}

struct Inner {
    queues: Mutex<HashMap<String, VecDeque<StoredMessage>>>,
    message_sent: Notify,
    visibility_timeout: Duration,
}

struct StoredMessage {
    message_id: String,
    body: String,
    receive_count: u32,
    in_flight: Option<InFlight>,
}

struct InFlight {
    receipt_handle: String,
    visible_at: Instant,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide received messages for `visibility_timeout` before making them available again.
    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                queues: Mutex::new(HashMap::new()),
                message_sent: Notify::new(),
                visibility_timeout,
            }),
        }
    }

    /// Enqueue a message body on `endpoint`, returning the id assigned to it.
    pub fn send(&self, endpoint: &str, body: impl Into<String>) -> String {
        let message_id = Uuid::new_v4().to_string();
        self.queues()
            .entry(endpoint.to_owned())
            .or_default()
            .push_back(StoredMessage {
                message_id: message_id.clone(),
                body: body.into(),
                receive_count: 0,
                in_flight: None,
            });
        self.inner.message_sent.notify_waiters();
        message_id
    }

    /// The number of messages on `endpoint` that have not been deleted, in flight or not.
    pub fn len(&self, endpoint: &str) -> usize {
        self.queues().get(endpoint).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, endpoint: &str) -> bool {
        self.len(endpoint) == 0
    }

    /// The number of messages on `endpoint` that have been received and are still hidden.
    pub fn in_flight(&self, endpoint: &str) -> usize {
        let now = Instant::now();
        self.queues().get(endpoint).map_or(0, |messages| {
            messages
                .iter()
                .filter(|m| m.in_flight.as_ref().is_some_and(|f| f.visible_at > now))
                .count()
        })
    }

    fn queues(&self) -> MutexGuard<'_, HashMap<String, VecDeque<StoredMessage>>> {
        // The state is never left half-updated, so a poisoned lock is still usable.
        self.inner
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Take up to `max` visible messages, returning them together with the instant at which
    /// the next in-flight message becomes visible again.
    fn take_visible(&self, endpoint: &str, max: usize) -> (Vec<RawMessage>, Option<Instant>) {
        let now = Instant::now();
        let mut queues = self.queues();
        let Some(messages) = queues.get_mut(endpoint) else {
            return (vec![], None);
        };

        let mut batch = Vec::new();
        let mut next_visible_at: Option<Instant> = None;
        for message in messages.iter_mut() {
            match &message.in_flight {
                Some(in_flight) if in_flight.visible_at > now => {
                    next_visible_at = Some(
                        next_visible_at
                            .map_or(in_flight.visible_at, |t| t.min(in_flight.visible_at)),
                    );
                }
                _ if batch.len() < max => {
                    let receipt_handle = Uuid::new_v4().to_string();
                    message.receive_count += 1;
                    message.in_flight = Some(InFlight {
                        receipt_handle: receipt_handle.clone(),
                        visible_at: now + self.inner.visibility_timeout,
                    });
                    batch.push(RawMessage {
                        message_id: message.message_id.clone(),
                        receipt_handle,
                        body: message.body.clone(),
                        receive_count: message.receive_count,
                    });
                }
                _ => {}
            }
        }
        (batch, next_visible_at)
    }
}

#[async_trait::async_trait]
impl QueueClient for InMemoryQueue {
    async fn receive(&self, request: ReceiveRequest<'_>) -> Result<Vec<RawMessage>, anyhow::Error> {
        let deadline = Instant::now() + request.wait_time;
        loop {
            // Register interest before looking at the queue, so that a message sent in between
            // still wakes us up.
            let message_sent = self.inner.message_sent.notified();

            let (batch, next_visible_at) =
                self.take_visible(request.endpoint, request.max_messages);
            if !batch.is_empty() || Instant::now() >= deadline {
                return Ok(batch);
            }

            let wake_at = next_visible_at.map_or(deadline, |t| t.min(deadline));
            tokio::select! {
                _ = message_sent => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete(&self, endpoint: &str, message: &RawMessage) -> Result<(), anyhow::Error> {
        let mut queues = self.queues();
        let messages = queues
            .get_mut(endpoint)
            .ok_or_else(|| anyhow::anyhow!("Queue `{endpoint}` does not exist."))?;
        let position = messages
            .iter()
            .position(|m| {
                m.in_flight
                    .as_ref()
                    .is_some_and(|f| f.receipt_handle == message.receipt_handle)
            })
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Receipt handle `{}` is not valid for queue `{endpoint}`.",
                    message.receipt_handle
                )
            })?;
        messages.remove(position);
        Ok(())
    }
}
