/// Error types for Blog Service
///
/// Errors are converted to appropriate HTTP responses for API clients.
/// Server-side failures are logged in full and answered with a generic message.
use crate::saga::SagaReport;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use document_store::StoreError;
use error_types::{error_codes, error_types as kinds, ErrorResponse};
use std::fmt;

/// Result type for blog-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Document store operation failed
    DatabaseError(String),

    /// Validation failed
    ValidationError(String),

    /// Request breaks a social rule (self-like, duplicate follow, ...)
    BadRequest(String),

    /// Caller is not allowed to act on the resource
    Forbidden(String),

    /// Resource not found; the code names which kind
    NotFound { code: &'static str, message: String },

    /// Concurrent modification could not be resolved
    Conflict(String),

    /// A cascading delete failed; carries what ran and what was restored
    CascadeFailed(Box<SagaReport>),

    /// Internal server error
    Internal(String),
}

impl AppError {
    pub fn user_not_found() -> Self {
        AppError::NotFound {
            code: error_codes::USER_NOT_FOUND,
            message: "User not found".to_string(),
        }
    }

    pub fn blog_not_found() -> Self {
        AppError::NotFound {
            code: error_codes::BLOG_NOT_FOUND,
            message: "Blog not found".to_string(),
        }
    }

    pub fn comment_not_found() -> Self {
        AppError::NotFound {
            code: error_codes::COMMENT_NOT_FOUND,
            message: "Comment not found".to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound {
            code: error_codes::NOT_FOUND,
            message: message.into(),
        }
    }

    fn detail(&self) -> &str {
        match self {
            AppError::DatabaseError(msg)
            | AppError::ValidationError(msg)
            | AppError::BadRequest(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::Internal(msg) => msg,
            AppError::NotFound { message, .. } => message,
            AppError::CascadeFailed(_) => "Cascade delete failed",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound { message, .. } => write!(f, "Not found: {}", message),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::CascadeFailed(report) => write!(
                f,
                "Cascade {} failed at {:?}",
                report.saga,
                report.failed.iter().map(|s| s.step.as_str()).collect::<Vec<_>>()
            ),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) | AppError::CascadeFailed(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let (error_type, code) = match self {
            AppError::DatabaseError(_) => (kinds::SERVER_ERROR, error_codes::DATABASE_ERROR),
            AppError::ValidationError(_) => {
                (kinds::VALIDATION_ERROR, error_codes::VALIDATION_ERROR)
            }
            AppError::BadRequest(_) => (kinds::VALIDATION_ERROR, error_codes::INVALID_REQUEST),
            AppError::Forbidden(_) => (kinds::AUTHORIZATION_ERROR, error_codes::FORBIDDEN),
            AppError::NotFound { code, .. } => (kinds::NOT_FOUND_ERROR, *code),
            AppError::Conflict(_) => (kinds::CONFLICT_ERROR, error_codes::VERSION_CONFLICT),
            AppError::CascadeFailed(_) | AppError::Internal(_) => {
                (kinds::SERVER_ERROR, error_codes::INTERNAL_SERVER_ERROR)
            }
        };

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error"
        } else {
            self.detail()
        };

        let body = ErrorResponse::new(
            ErrorResponse::reason_phrase(status.as_u16()),
            message,
            status.as_u16(),
            error_type,
            code,
        );

        // The saga report names steps and counts only, never document contents.
        if let AppError::CascadeFailed(report) = self {
            let mut value = serde_json::to_value(&body).unwrap_or_default();
            value["message"] = serde_json::Value::from(self.detail());
            value["report"] = serde_json::to_value(report.as_ref()).unwrap_or_default();
            return HttpResponse::build(status).json(value);
        }

        HttpResponse::build(status).json(body)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => {
                AppError::not_found(format!("{} {} not found", collection, id))
            }
            StoreError::ContentionExhausted { .. } | StoreError::VersionConflict { .. } => {
                AppError::Conflict(err.to_string())
            }
            other => AppError::DatabaseError(other.to_string()),
        }
    }
}
