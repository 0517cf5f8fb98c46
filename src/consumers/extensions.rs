//! Poll-local storage: a type-map that lives for the duration of a single `poll` invocation.
//!
//! The poller uses it to hand resources acquired by a [`ResourceScope`] to message handlers
//! without threading them through every call. Handlers (and anything they call into) can also
//! use it to stash data that should outlive a single message but not the polling loop.
//!
//! Our implementation relies on task-local storage: it is only reachable from code running
//! inside the polling future, i.e. not from tasks spawned by a handler.
//!
//! [`ResourceScope`]: crate::consumers::ResourceScope
#![allow(clippy::declare_interior_mutable_const)] // silence tokio::task_local warning

use std::cell::RefCell;
use std::future::Future;
use task_local_extensions::Extensions;

tokio::task_local! {
    static EXTENSIONS: RefCell<Extensions>;
}

/// Run `fut` with `extensions` installed as poll-local storage, handing back whatever the
/// storage contains once `fut` completes.
pub(crate) async fn with_extensions<T>(
    extensions: Extensions,
    fut: impl Future<Output = T>,
) -> (Extensions, T) {
    EXTENSIONS
        .scope(RefCell::new(extensions), async move {
            let output = fut.await;
            let extensions = RefCell::new(Extensions::new());

            EXTENSIONS.with(|ext| ext.swap(&extensions));

            (extensions.into_inner(), output)
        })
        .await
}

/// Retrieve an item from poll-local storage based on its type.
///
/// It returns `None` outside of a polling loop or if no item of that type was stored.
pub fn get_poll_local_item<T: Send + Sync + Clone + 'static>() -> Option<T> {
    EXTENSIONS
        .try_with(|e| e.borrow().get::<T>().cloned())
        .ok()
        .flatten()
}

/// Insert an item in poll-local storage, replacing any item of the same type.
pub fn set_poll_local_item<T: Send + Sync + 'static>(item: T) {
    let _ = EXTENSIONS
        .try_with(|e| e.borrow_mut().insert(item))
        .map_err(|_| tracing::warn!("Poll-local storage is only available while polling."));
}
