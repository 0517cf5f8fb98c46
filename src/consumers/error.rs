use crate::decoding::DecodeError;
use std::fmt;

/// The error type returned by message handlers.
///
/// Handlers can return any error type that converts into `HandlerError`: everything that
/// converts into an [`anyhow::Error`] does, via `?` on the `anyhow` error.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    /// The handler relies on the default [`Handler::handle`](crate::consumers::Handler::handle),
    /// which is only an extension point.
    #[error("`{handler}` does not implement `Handler::handle`.")]
    NotImplemented { handler: &'static str },
    /// Processing failed - the message will not be deleted.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Why the processing of a single message failed.
///
/// A `ProcessingError` never stops the poller: the message is left on the queue, the failure is
/// logged and forwarded to the [`Notifier`](crate::consumers::Notifier), and polling carries on
/// with the next message.
#[derive(thiserror::Error, Debug)]
pub enum ProcessingError {
    #[error("Failed to decode the message.")]
    Decode(#[from] DecodeError),
    #[error("The message handler failed.")]
    Handler(#[from] HandlerError),
    #[error("The message handler panicked: {0}")]
    Panicked(String),
}

/// Errors that stop a [`QueuePoller`](crate::consumers::QueuePoller) from being built or from
/// polling.
#[derive(thiserror::Error, Debug)]
pub enum PollerError {
    #[error("Invalid poller configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Failed to receive messages from `{endpoint}`.")]
    Receive {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to delete message `{message_id}` from `{endpoint}`.")]
    Delete {
        endpoint: String,
        message_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to acquire the resource scope for polling.")]
    ResourceScope(#[source] anyhow::Error),
}

/// Renders an error followed by its chain of sources, one per line.
pub(crate) struct ErrorChain<'a>(pub(crate) &'a (dyn std::error::Error + 'static));

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(cause) = source {
            write!(f, "\n  caused by: {cause}")?;
            source = cause.source();
        }
        Ok(())
    }
}
