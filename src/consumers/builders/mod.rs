pub use queue_poller::QueuePollerBuilder;

mod queue_poller;
