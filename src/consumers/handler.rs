//! The `Handler` trait is heavily inspired by `tide`'s approach to endpoint handlers.
use crate::consumers::{HandlerError, Incoming};
use std::future::Future;

/// Implementers of the `Handler` trait process the messages a
/// [`QueuePoller`](crate::consumers::QueuePoller) receives.
///
/// # Scope
///
/// `handle` does not get access to the queue client.
/// The poller deletes the message if `handle` returns `Ok(())` and leaves it on the queue,
/// for redelivery, otherwise.
///
/// # Implementers
///
/// The default `handle` always fails with [`HandlerError::NotImplemented`]: every consumer is
/// expected to provide its own.
/// While you can implement `Handler` for a struct or enum, most of the time you will be relying
/// on [`ClosureHandler`], which turns async functions with a matching signature -
/// `Fn(Incoming<Context>) -> Fut` - into handlers.
#[async_trait::async_trait]
pub trait Handler<Context>: Send + Sync + 'static
where
    Context: Send + Sync + 'static,
{
    async fn handle(&self, incoming: Incoming<Context>) -> Result<(), HandlerError> {
        drop(incoming);
        Err(HandlerError::NotImplemented {
            handler: self.name(),
        })
    }

    /// The name used to identify this handler when reporting failures.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Implement the [`Handler`] trait for all Boxed handlers.
///
/// E.g. Box<dyn Handler<Context>>.
#[async_trait::async_trait]
impl<Context, H> Handler<Context> for Box<H>
where
    Context: Send + Sync + 'static,
    H: Handler<Context> + ?Sized,
{
    async fn handle(&self, incoming: Incoming<Context>) -> Result<(), HandlerError> {
        H::handle(self, incoming).await
    }

    fn name(&self) -> &'static str {
        H::name(self)
    }
}

/// `AsyncClosure` is implemented for all functions of the form:
/// ```ignore
/// async fn(incoming: Incoming<Context>) -> Result<(), impl Into<HandlerError>>;
/// ```
///
/// When combined with the [`ClosureHandler`] type, you get a [`Handler`] that can be used
/// by a poller. `QueuePollerBuilder::handler` will automatically perform this wrapping for you.
pub trait AsyncClosure<Context>: Send + Sync + 'static {
    type Output: Future<Output = Result<(), Self::Err>> + Send;
    type Err: Into<HandlerError> + 'static;
    fn call(&self, incoming: Incoming<Context>) -> Self::Output;
}

impl<F, Fut, Err, Context> AsyncClosure<Context> for F
where
    F: Fn(Incoming<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Err>> + Send,
    Err: Into<HandlerError> + 'static,
{
    type Err = Err;
    type Output = Fut;

    fn call(&self, incoming: Incoming<Context>) -> Self::Output {
        (self)(incoming)
    }
}

/// Wrapper type to turn an [`AsyncClosure`] into a [`Handler`].
pub struct ClosureHandler<H>(pub H);

#[async_trait::async_trait]
impl<Context, F> Handler<Context> for ClosureHandler<F>
where
    Context: Send + Sync + 'static,
    F: AsyncClosure<Context>,
{
    async fn handle(&self, incoming: Incoming<Context>) -> Result<(), HandlerError> {
        self.0.call(incoming).await.map_err(Into::into)
    }
}
