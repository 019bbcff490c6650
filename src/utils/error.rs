//! Error Handling
//!
//! Application error taxonomy shared by every service. Each operational
//! variant carries a client-safe message; non-operational variants are
//! logged in full and surfaced only as a generic 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid credentials/tokens
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate resources (email/phone already registered)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Account temporarily locked after repeated failed logins
    #[error("Locked: {0}")]
    Locked(String),

    /// Malformed or unusable request input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request payload failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Outbound email could not be delivered
    #[error("Email delivery failed: {0}")]
    EmailDelivery(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Password hashing failed
    #[error("Password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    /// Unexpected internal error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code associated with this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Locked(_) => StatusCode::LOCKED,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::EmailDelivery(_)
            | AppError::Database(_)
            | AppError::Hashing(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error message is safe to show verbatim to the client
    ///
    /// Non-operational errors (database, hashing, mail transport,
    /// unexpected internals) must never leak detail; the client sees a
    /// generic message while the full cause is logged.
    pub fn is_operational(&self) -> bool {
        !matches!(
            self,
            AppError::EmailDelivery(_)
                | AppError::Database(_)
                | AppError::Hashing(_)
                | AppError::Internal(_)
        )
    }
}

/// Standard error envelope returned by every endpoint
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub status: &'static str,
    pub code: u16,
    pub msg: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let msg = match &self {
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Locked(msg)
            | AppError::BadRequest(msg)
            | AppError::Validation(msg) => msg.clone(),
            AppError::EmailDelivery(_)
            | AppError::Database(_)
            | AppError::Hashing(_)
            | AppError::Internal(_) => {
                log::error!("{}", self);
                "Internal Server Error".to_string()
            }
        };

        let body = ErrorBody {
            status: "error",
            code: status.as_u16(),
            msg,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for operations that can return AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Locked("x".into()).status_code(),
            StatusCode::LOCKED
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_operational_split() {
        assert!(AppError::Forbidden("nope".into()).is_operational());
        assert!(AppError::BadRequest("nope".into()).is_operational());
        assert!(!AppError::Internal("boom".into()).is_operational());
        assert!(!AppError::EmailDelivery("smtp down".into()).is_operational());
    }

    #[test]
    fn test_display_carries_message() {
        let err = AppError::Locked("Account locked. Try again later".into());
        assert_eq!(err.to_string(), "Locked: Account locked. Try again later");
    }
}
