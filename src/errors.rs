// src/errors.rs

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Auth errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid token")]
    InvalidToken,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Leave ledger errors
    #[error("Insufficient leave balance: requested {requested} days, remaining {remaining}")]
    InsufficientBalance { requested: i32, remaining: i32 },

    #[error("Employee {0} is not on leave")]
    NotOnLeave(uuid::Uuid),

    // Notification errors
    #[error("Email error: {0}")]
    EmailError(String),
}

impl AppError {
    /// Stable machine-readable kind returned alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Unauthorized(_) | AppError::InvalidToken => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            AppError::NotOnLeave(_) => "NOT_ON_LEAVE",
            AppError::Database(_) | AppError::EmailError(_) => "INTERNAL",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientBalance { .. } | AppError::NotOnLeave(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Database(_) | AppError::EmailError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the underlying database error is a unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(kind = self.kind(), "{}", self);
        }
        let body = json!({
            "success": false,
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (status, Json(body)).into_response()
    }
}

// Convenience alias
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(AppError::Validation("x".into()).kind(), "VALIDATION");
        assert_eq!(AppError::InvalidState("x".into()).kind(), "INVALID_STATE");
        assert_eq!(AppError::Conflict("x".into()).kind(), "CONFLICT");
        assert_eq!(
            AppError::InsufficientBalance {
                requested: 5,
                remaining: 3
            }
            .kind(),
            "INSUFFICIENT_BALANCE"
        );
        assert_eq!(AppError::Database(sqlx::Error::RowNotFound).kind(), "INTERNAL");
    }

    #[test]
    fn conflict_and_invalid_state_share_status() {
        assert_eq!(
            AppError::Conflict("open record".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidState("already decided".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotOnLeave(uuid::Uuid::nil()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn infrastructure_failures_are_internal() {
        let email = AppError::EmailError("smtp down".into());
        assert_eq!(email.kind(), "INTERNAL");
        assert_eq!(email.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::Database(sqlx::Error::PoolTimedOut).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn row_not_found_is_not_a_unique_violation() {
        assert!(!AppError::Database(sqlx::Error::RowNotFound).is_unique_violation());
    }
}
