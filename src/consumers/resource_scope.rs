use task_local_extensions::Extensions;

#[async_trait::async_trait]
/// A resource acquired once per `poll` invocation and released when polling ends.
///
/// # Use case
///
/// Handlers often need a resource that is expensive to check out - e.g. a database connection
/// from a pool. Rather than checking one out for every message, a poller configured with
/// `connection_pool_scope` acquires it once, before the first receive request, and holds it for
/// the whole polling loop.
///
/// `acquire` stores what it acquired in `extensions`. Handlers retrieve it with
/// [`get_poll_local_item`](crate::consumers::get_poll_local_item). The extensions, and
/// everything in them, are dropped exactly once when `poll` returns - whether it returns
/// normally or with an error.
///
/// Check out [`PooledConnectionScope`](crate::pool::PooledConnectionScope) for a `deadpool`-based
/// implementation.
pub trait ResourceScope: Send + Sync + 'static {
    async fn acquire(&self, extensions: &mut Extensions) -> Result<(), anyhow::Error>;
}

/// assert it's object safe
type _CHECK = Box<dyn ResourceScope>;
