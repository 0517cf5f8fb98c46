//! Ready-made hooks to customise the polling loop.
pub mod before_request;
