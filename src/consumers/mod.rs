//! Facilities to long-poll a queue and process its messages. Check out [`QueuePoller`] as a
//! starting point.
// Re-export for convenience
pub use task_local_extensions::Extensions;

pub use before_request_hook::{BeforeRequestHook, PollControl, PollStats};
pub use builders::QueuePollerBuilder;
pub use configuration::PollerConfig;
pub use error::{HandlerError, PollerError, ProcessingError};
pub use extensions::{get_poll_local_item, set_poll_local_item};
pub use handler::{AsyncClosure, ClosureHandler, Handler};
pub use incoming_message::Incoming;
pub use notifier::{FailedPayload, Notifier, TracingNotifier};
pub use poller::{PollSummary, QueuePoller, StopReason};
pub use resource_scope::ResourceScope;

mod before_request_hook;
mod builders;
mod configuration;
mod error;
mod extensions;
mod handler;
pub mod hooks;
mod incoming_message;
mod notifier;
mod poller;
mod resource_scope;
