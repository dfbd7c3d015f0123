//! Shared error response body and error codes for Inkwell services.
//!
//! Every service maps its own error enum onto [`ErrorResponse`] so clients see one
//! JSON shape regardless of which service answered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Machine-readable error codes carried in [`ErrorResponse::code`].
pub mod error_codes {
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const STORAGE_PROVIDER_ERROR: &str = "STORAGE_PROVIDER_ERROR";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VERSION_CONFLICT: &str = "VERSION_CONFLICT";

    pub const GALLERY_NOT_FOUND: &str = "GALLERY_NOT_FOUND";
    pub const VIDEO_NOT_FOUND: &str = "VIDEO_NOT_FOUND";
    pub const INSUFFICIENT_STORAGE: &str = "INSUFFICIENT_STORAGE";
    pub const BANDWIDTH_EXCEEDED: &str = "BANDWIDTH_EXCEEDED";
    pub const UNSUPPORTED_MEDIA_TYPE: &str = "UNSUPPORTED_MEDIA_TYPE";

    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    pub const BLOG_NOT_FOUND: &str = "BLOG_NOT_FOUND";
    pub const COMMENT_NOT_FOUND: &str = "COMMENT_NOT_FOUND";
}

/// Broad error categories carried in [`ErrorResponse::error_type`].
pub mod error_types {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const AUTHENTICATION_ERROR: &str = "authentication_error";
    pub const AUTHORIZATION_ERROR: &str = "authorization_error";
    pub const NOT_FOUND_ERROR: &str = "not_found_error";
    pub const CONFLICT_ERROR: &str = "conflict_error";
    pub const SERVER_ERROR: &str = "server_error";
}

/// JSON error body returned by every HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Always `false`; lets clients branch on one field for every response.
    pub success: bool,
    /// Short reason phrase, e.g. "Bad Request".
    pub error: String,
    /// Human-readable message safe to show to end users.
    pub message: String,
    pub status: u16,
    pub error_type: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Reason phrase for the status codes services actually emit.
    pub fn reason_phrase(status: u16) -> &'static str {
        match status {
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            409 => "Conflict",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_and_success_flag() {
        let body = ErrorResponse::new(
            "Bad Request",
            "Insufficient storage space",
            400,
            error_types::VALIDATION_ERROR,
            error_codes::INSUFFICIENT_STORAGE,
        );

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Insufficient storage space");
        assert_eq!(json["errorType"], "validation_error");
        assert_eq!(json["code"], "INSUFFICIENT_STORAGE");
    }

    #[test]
    fn reason_phrase_falls_back_for_unknown_status() {
        assert_eq!(ErrorResponse::reason_phrase(404), "Not Found");
        assert_eq!(ErrorResponse::reason_phrase(418), "Error");
    }
}
