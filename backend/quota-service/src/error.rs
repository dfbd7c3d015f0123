/// Error types for Quota Service
///
/// Errors are converted to appropriate HTTP responses for API clients.
/// Server-side failures are logged in full and answered with a generic message.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use document_store::StoreError;
use error_types::{error_codes, error_types as kinds, ErrorResponse};
use idempotent_consumer::IdempotencyError;
use thiserror::Error;
use transactional_outbox::OutboxError;

/// Result type for quota-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Failures while consuming events or serving read-models.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Event data does not match its declared type.
    #[error("Malformed event data: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic concurrency retries ran out.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),

    #[error("Idempotency check failed: {0}")]
    Idempotency(#[from] IdempotencyError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn detail(&self) -> String {
        match self {
            AppError::NotFound(msg) | AppError::Conflict(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_)
            | AppError::Outbox(_)
            | AppError::Idempotency(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let (error_type, code) = match self {
            AppError::DatabaseError(_) => (kinds::SERVER_ERROR, error_codes::DATABASE_ERROR),
            AppError::MalformedEvent(_) => (kinds::VALIDATION_ERROR, error_codes::VALIDATION_ERROR),
            AppError::NotFound(_) => (kinds::NOT_FOUND_ERROR, error_codes::NOT_FOUND),
            AppError::Outbox(_) | AppError::Idempotency(_) | AppError::Internal(_) => {
                (kinds::SERVER_ERROR, error_codes::INTERNAL_SERVER_ERROR)
            }
            AppError::Conflict(_) => (kinds::CONFLICT_ERROR, error_codes::VERSION_CONFLICT),
        };

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.detail()
        };

        HttpResponse::build(status).json(ErrorResponse::new(
            ErrorResponse::reason_phrase(status.as_u16()),
            &message,
            status.as_u16(),
            error_type,
            code,
        ))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => {
                AppError::NotFound(format!("{} {} not found", collection, id))
            }
            StoreError::ContentionExhausted { .. } | StoreError::VersionConflict { .. } => {
                AppError::Conflict(err.to_string())
            }
            other => AppError::DatabaseError(other.to_string()),
        }
    }
}
