use crate::helpers::{
    envelope, order, raw_message, RecordingNotifier, ScriptedClient, Step, ENDPOINT,
};
use deadpool::managed::{self, Pool};
use queue_poller::consumers::{
    get_poll_local_item, set_poll_local_item, HandlerError, Incoming, PollerConfig, PollerError,
    QueuePoller,
};
use queue_poller::pool::{PooledConnection, PooledConnectionScope};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
struct Connection {
    id: usize,
}

#[derive(Default)]
struct ConnectionManager {
    created: AtomicUsize,
    unavailable: bool,
}

#[async_trait::async_trait]
impl managed::Manager for ConnectionManager {
    type Type = Connection;
    type Error = anyhow::Error;

    async fn create(&self) -> Result<Connection, anyhow::Error> {
        if self.unavailable {
            anyhow::bail!("the database is down");
        }
        Ok(Connection {
            id: self.created.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn recycle(&self, _connection: &mut Connection) -> managed::RecycleResult<anyhow::Error> {
        Ok(())
    }
}

type Pooled = PooledConnection<ConnectionManager>;

#[derive(Default)]
struct Context {
    seen_connections: Mutex<Vec<Option<usize>>>,
}

async fn record_connection(incoming: Incoming<Context>) -> Result<(), HandlerError> {
    let connection = get_poll_local_item::<Pooled>().map(|c| c.id);
    incoming.context.seen_connections.lock().unwrap().push(connection);
    Ok(())
}

fn pool(manager: ConnectionManager) -> Pool<ConnectionManager> {
    Pool::builder(manager).max_size(1).build().unwrap()
}

fn two_messages() -> ScriptedClient {
    ScriptedClient::new([
        Step::Batch(vec![raw_message("1", envelope(&order(1)))]),
        Step::Batch(vec![raw_message("2", envelope(&order(2)))]),
    ])
}

/// The pool only holds one object: checking it out again proves it was returned.
async fn assert_released(pool: &Pool<ConnectionManager>) {
    let connection = tokio::time::timeout(Duration::from_secs(1), pool.get())
        .await
        .expect("The pooled connection was not released")
        .unwrap();
    assert_eq!(connection.id, 0);
}

#[tokio::test(start_paused = true)]
async fn one_connection_is_held_for_the_whole_poll_and_released_afterwards() {
    // Arrange
    let pool = pool(ConnectionManager::default());
    let context = Arc::new(Context::default());
    let config = PollerConfig::new(ENDPOINT).with_connection_pool_scope(true);
    let poller = QueuePoller::builder(config, two_messages(), context.clone())
        .with_notifier(RecordingNotifier::default())
        .with_resource_scope(PooledConnectionScope::new(pool.clone()))
        .handler(record_connection)
        .unwrap();

    // Act
    poller.poll().await.unwrap();

    // Assert
    assert_eq!(*context.seen_connections.lock().unwrap(), vec![Some(0), Some(0)]);
    assert_eq!(pool.status().size, 1);
    assert_released(&pool).await;
}

#[tokio::test(start_paused = true)]
async fn the_connection_is_released_when_polling_fails() {
    // Arrange
    let pool = pool(ConnectionManager::default());
    let client = ScriptedClient::new([Step::Fail("connection reset by peer")]);
    let config = PollerConfig::new(ENDPOINT).with_connection_pool_scope(true);
    let poller = QueuePoller::builder(config, client, Context::default())
        .with_notifier(RecordingNotifier::default())
        .with_resource_scope(PooledConnectionScope::new(pool.clone()))
        .handler(record_connection)
        .unwrap();

    // Act
    let result = poller.poll().await;

    // Assert
    assert!(matches!(result, Err(PollerError::Receive { .. })));
    assert_released(&pool).await;
}

#[tokio::test(start_paused = true)]
async fn a_scope_that_cannot_be_acquired_prevents_polling() {
    // Arrange
    let pool = pool(ConnectionManager {
        unavailable: true,
        ..Default::default()
    });
    let client = two_messages();
    let config = PollerConfig::new(ENDPOINT).with_connection_pool_scope(true);
    let poller = QueuePoller::builder(config, client.clone(), Context::default())
        .with_notifier(RecordingNotifier::default())
        .with_resource_scope(PooledConnectionScope::new(pool))
        .handler(record_connection)
        .unwrap();

    // Act
    let result = poller.poll().await;

    // Assert
    assert!(matches!(result, Err(PollerError::ResourceScope(_))));
    assert_eq!(client.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn the_scope_is_ignored_unless_enabled_in_the_configuration() {
    // Arrange
    let pool = pool(ConnectionManager::default());
    let context = Arc::new(Context::default());
    let poller = QueuePoller::builder(PollerConfig::new(ENDPOINT), two_messages(), context.clone())
        .with_notifier(RecordingNotifier::default())
        .with_resource_scope(PooledConnectionScope::new(pool.clone()))
        .handler(record_connection)
        .unwrap();

    // Act
    poller.poll().await.unwrap();

    // Assert
    assert_eq!(*context.seen_connections.lock().unwrap(), vec![None, None]);
    assert_eq!(pool.status().size, 0);
}

#[test]
fn enabling_the_scope_without_providing_one_is_a_configuration_error() {
    let config = PollerConfig::new(ENDPOINT).with_connection_pool_scope(true);
    let result = QueuePoller::builder(config, two_messages(), Context::default())
        .handler(record_connection);
    assert!(matches!(result, Err(PollerError::InvalidConfiguration(_))));
}

#[tokio::test(start_paused = true)]
async fn poll_local_items_outlive_a_message_but_not_the_poll() {
    // Arrange
    #[derive(Clone)]
    struct Processed(usize);

    #[derive(Default)]
    struct Seen(Mutex<Vec<usize>>);

    async fn handler(incoming: Incoming<Seen>) -> Result<(), HandlerError> {
        let processed = get_poll_local_item::<Processed>().map_or(0, |p| p.0);
        incoming.context.0.lock().unwrap().push(processed);
        set_poll_local_item(Processed(processed + 1));
        Ok(())
    }

    let context = Arc::new(Seen::default());
    let poller = QueuePoller::builder(PollerConfig::new(ENDPOINT), two_messages(), context.clone())
        .with_notifier(RecordingNotifier::default())
        .handler(handler)
        .unwrap();

    // Act
    poller.poll().await.unwrap();

    // Assert
    assert_eq!(*context.0.lock().unwrap(), vec![0, 1]);
    assert!(get_poll_local_item::<Processed>().is_none());
}
