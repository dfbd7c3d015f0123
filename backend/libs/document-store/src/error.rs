//! Error types for the document store.

use thiserror::Error;

/// Result type alias for document store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Document body could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document {collection}/{id} already exists")]
    AlreadyExists { collection: &'static str, id: String },

    #[error("Document {collection}/{id} not found")]
    NotFound { collection: &'static str, id: String },

    /// Optimistic concurrency check failed: someone else wrote first.
    #[error("Version conflict on {collection}/{id}: expected {expected}")]
    VersionConflict {
        collection: &'static str,
        id: String,
        expected: u64,
    },

    /// `modify` gave up after repeated version conflicts.
    #[error("Too much contention on {collection}/{id} after {attempts} attempts")]
    ContentionExhausted {
        collection: &'static str,
        id: String,
        attempts: u32,
    },
}

impl StoreError {
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }

    /// Transient failures that a caller may retry as-is.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(err) => {
                matches!(err, sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed)
            }
            StoreError::VersionConflict { .. } | StoreError::ContentionExhausted { .. } => true,
            _ => false,
        }
    }
}
