//! A [`ResourceScope`] that checks out one object from a [`deadpool`] pool for the whole duration
//! of a `poll` invocation.
//!
//! ```rust
//! use queue_poller::consumers::{get_poll_local_item, Incoming, PollerConfig, QueuePoller};
//! use queue_poller::consumers::HandlerError;
//! use queue_poller::pool::{PooledConnection, PooledConnectionScope};
//! use queue_poller::queue::InMemoryQueue;
//!
//! struct Manager;
//!
//! #[async_trait::async_trait]
//! impl deadpool::managed::Manager for Manager {
//!     type Type = String;
//!     type Error = std::convert::Infallible;
//!
//!     async fn create(&self) -> Result<String, Self::Error> {
//!         Ok("connection".into())
//!     }
//!
//!     async fn recycle(&self, _: &mut String) -> deadpool::managed::RecycleResult<Self::Error> {
//!         Ok(())
//!     }
//! }
//!
//! async fn handler(_incoming: Incoming<()>) -> Result<(), HandlerError> {
//!     let connection = get_poll_local_item::<PooledConnection<Manager>>();
//!     assert!(connection.is_some());
//!     Ok(())
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let pool = deadpool::managed::Pool::builder(Manager).max_size(4).build()?;
//! let config = PollerConfig::new("orders-queue").with_connection_pool_scope(true);
//! let poller = QueuePoller::builder(config, InMemoryQueue::new(), ())
//!     .with_resource_scope(PooledConnectionScope::new(pool))
//!     .handler(handler)?;
//! # drop(poller);
//! # Ok(())
//! # }
//! ```
use crate::consumers::ResourceScope;
use deadpool::managed::{Manager, Object, Pool};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use task_local_extensions::Extensions;

/// Checks out one object from `pool` when polling starts and returns it when polling ends.
///
/// The object is stored in poll-local storage as a [`PooledConnection`].
pub struct PooledConnectionScope<M: Manager> {
    pool: Pool<M>,
}

impl<M: Manager> PooledConnectionScope<M> {
    pub fn new(pool: Pool<M>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<M> {
        &self.pool
    }
}

/// An object checked out of a pool by [`PooledConnectionScope`].
///
/// Clones share the same object: it goes back to the pool once every clone has been dropped.
pub struct PooledConnection<M: Manager>(Arc<Object<M>>);

impl<M: Manager> Clone for PooledConnection<M> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<M: Manager> Deref for PooledConnection<M> {
    type Target = M::Type;

    fn deref(&self) -> &M::Type {
        &self.0
    }
}

impl<M: Manager> fmt::Debug for PooledConnection<M>
where
    M::Type: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PooledConnection").field(&**self).finish()
    }
}

#[async_trait::async_trait]
impl<M> ResourceScope for PooledConnectionScope<M>
where
    M: Manager + 'static,
    M::Type: Send + Sync,
    M::Error: fmt::Display,
{
    async fn acquire(&self, extensions: &mut Extensions) -> Result<(), anyhow::Error> {
        let object = self
            .pool
            .get()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to check out a pooled connection: {e}"))?;
        tracing::debug!(status = ?self.pool.status(), "Checked out a pooled connection");
        extensions.insert(PooledConnection(Arc::new(object)));
        Ok(())
    }
}
