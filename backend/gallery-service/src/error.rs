/// Error types for Gallery Service
///
/// Errors are converted to appropriate HTTP responses for API clients.
/// Server-side failures are logged in full and answered with a generic message.
use crate::models::QuotaError;
use crate::storage::StorageError;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use document_store::StoreError;
use error_types::{error_codes, error_types as kinds, ErrorResponse};
use std::fmt;

/// Result type for gallery-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Document store operation failed
    DatabaseError(String),

    /// Object storage provider failed
    StorageError(String),

    /// Validation failed
    ValidationError(String),

    /// Resource not found
    NotFound(String),

    /// Internal server error
    Internal(String),

    /// Bad request
    BadRequest(String),

    /// Concurrent modification could not be resolved
    Conflict(String),
}

impl AppError {
    fn detail(&self) -> &str {
        match self {
            AppError::DatabaseError(msg)
            | AppError::StorageError(msg)
            | AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::Internal(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg) => msg,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::StorageError(msg) => write!(f, "Storage provider error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) | AppError::StorageError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let (error_type, code) = match self {
            AppError::DatabaseError(_) => (kinds::SERVER_ERROR, error_codes::DATABASE_ERROR),
            AppError::StorageError(_) => {
                (kinds::SERVER_ERROR, error_codes::STORAGE_PROVIDER_ERROR)
            }
            AppError::ValidationError(_) => {
                (kinds::VALIDATION_ERROR, error_codes::VALIDATION_ERROR)
            }
            AppError::NotFound(msg) if msg == crate::models::VIDEO_NOT_FOUND_MSG => {
                (kinds::NOT_FOUND_ERROR, error_codes::VIDEO_NOT_FOUND)
            }
            AppError::NotFound(_) => (kinds::NOT_FOUND_ERROR, error_codes::GALLERY_NOT_FOUND),
            AppError::Internal(_) => (kinds::SERVER_ERROR, error_codes::INTERNAL_SERVER_ERROR),
            AppError::BadRequest(msg) => (kinds::VALIDATION_ERROR, bad_request_code(msg)),
            AppError::Conflict(_) => (kinds::CONFLICT_ERROR, error_codes::VERSION_CONFLICT),
        };

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error"
        } else {
            self.detail()
        };

        let response = ErrorResponse::new(
            ErrorResponse::reason_phrase(status.as_u16()),
            message,
            status.as_u16(),
            error_type,
            code,
        );

        HttpResponse::build(status).json(response)
    }
}

fn bad_request_code(msg: &str) -> &'static str {
    match msg {
        crate::models::INSUFFICIENT_STORAGE_MSG => error_codes::INSUFFICIENT_STORAGE,
        crate::models::BANDWIDTH_EXCEEDED_MSG => error_codes::BANDWIDTH_EXCEEDED,
        _ => error_codes::INVALID_REQUEST,
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => {
                AppError::NotFound(crate::models::GALLERY_NOT_FOUND_MSG.to_string())
            }
            StoreError::ContentionExhausted { .. } | StoreError::VersionConflict { .. } => {
                AppError::Conflict(err.to_string())
            }
            other => AppError::DatabaseError(other.to_string()),
        }
    }
}

impl From<QuotaError> for AppError {
    fn from(err: QuotaError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<idempotent_consumer::IdempotencyError> for AppError {
    fn from(err: idempotent_consumer::IdempotencyError) -> Self {
        AppError::Internal(err.to_string())
    }
}
