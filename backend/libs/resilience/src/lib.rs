//! Retry and deadline helpers for the calls Inkwell services make across process boundaries:
//! connecting to PostgreSQL at start-up and posting outbox records to consumer callbacks.

pub mod retry;
pub mod timeout;

pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout, TimeoutError};
