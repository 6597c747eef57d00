//! Authentication Error Types
//!
//! Centralized error handling for all authentication operations.
//!
//! Anything that goes wrong inside token validation or session lookup is
//! reported to the caller as [`AuthError::Unauthorized`]; the precise reason
//! is only logged. Credential problems (bad email, duplicate email, wrong
//! password) stay distinct because the user can fix them.

use crate::session::StoreError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailExists,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error")]
    Internal,
}

impl AuthError {
    /// Collapse any failure from the validation chain into an opaque denial.
    ///
    /// `Internal` is kept as a denial too: an unreachable store must never
    /// let a request through.
    pub fn into_denial(self) -> Self {
        match self {
            AuthError::Unauthorized
            | AuthError::Forbidden
            | AuthError::NotFound
            | AuthError::Internal => AuthError::Unauthorized,
            other => other,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AuthError::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_input", msg.clone())
            }
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                self.to_string(),
            ),
            AuthError::EmailExists => (StatusCode::CONFLICT, "email_exists", self.to_string()),
            AuthError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string())
            }
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            AuthError::NotFound => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AuthError::Config(_) | AuthError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        (
            status,
            Json(serde_json::json!({
                "error": error_code,
                "message": message
            })),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AuthError::NotFound,
            err => {
                tracing::error!("Database error: {:?}", err);
                AuthError::Internal
            }
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Session store error: {}", err);
        AuthError::Internal
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("Password hashing error: {:?}", err);
        AuthError::Internal
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::InvalidInput(err.to_string())
    }
}
