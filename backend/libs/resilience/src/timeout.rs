//! Deadlines for outbound calls.

use std::future::Future;
use std::time::Duration;

/// The wrapped future did not finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no answer within {0:?}")]
pub struct TimeoutError(pub Duration);

impl TimeoutError {
    pub fn deadline(&self) -> Duration {
        self.0
    }
}

/// Await `future`, giving up after `deadline`. The future is dropped on expiry.
pub async fn with_timeout<F, T>(deadline: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| TimeoutError(deadline))
}
