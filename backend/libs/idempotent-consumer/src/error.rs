use thiserror::Error;

pub type IdempotencyResult<T> = Result<T, IdempotencyError>;

#[derive(Error, Debug)]
pub enum IdempotencyError {
    #[error("processed-event store failed: {0}")]
    Store(#[from] sqlx::Error),

    #[error("event id is empty")]
    EmptyEventId,

    /// `consumer:eventId` does not fit the key column.
    #[error("idempotency key is {len} characters, limit is {max}")]
    KeyTooLong { len: usize, max: usize },

    #[error("retention window out of range: {0}")]
    InvalidRetention(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IdempotencyError {
    /// Pool exhaustion is worth a redelivery; anything else will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IdempotencyError::Store(sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed)
        )
    }
}
