use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Outcomes of lock token checks and lock enforcement that stop a request.
///
/// Every variant maps to its own HTTP status and message so callers can tell
/// a missing token apart from a wrong one, or a conflict from a submitted
/// application.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("missing lock token")]
    TokenMissing,

    #[error("invalid lock token")]
    TokenInvalid,

    #[error("lock token has the wrong type")]
    TokenWrongType,

    #[error("lock token missing user identity")]
    MissingIdentity,

    #[error("lock token missing {0} claim")]
    MissingScopeClaim(&'static str),

    #[error("invalid grantVersion in lock token")]
    InvalidVersionClaim,

    #[error("lock token does not cover the requested application")]
    ScopeMismatch,

    #[error("application already submitted")]
    AlreadySubmitted,

    #[error("application locked by another user")]
    LockConflict,

    #[error("storage fault: {0}")]
    Storage(#[from] sqlx::Error),
}

impl LockError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::TokenMissing
            | Self::TokenInvalid
            | Self::TokenWrongType
            | Self::MissingIdentity => StatusCode::UNAUTHORIZED,
            Self::MissingScopeClaim(_) | Self::InvalidVersionClaim => StatusCode::BAD_REQUEST,
            Self::ScopeMismatch | Self::AlreadySubmitted => StatusCode::FORBIDDEN,
            Self::LockConflict => StatusCode::LOCKED,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Storage details never leave the service.
    pub fn public_message(&self) -> String {
        match self {
            Self::TokenMissing => "Missing lock token".to_string(),
            Self::TokenInvalid => "Invalid lock token".to_string(),
            Self::TokenWrongType => "Invalid lock token type".to_string(),
            Self::MissingIdentity => "Lock token missing user identity".to_string(),
            Self::MissingScopeClaim(claim) => format!("Lock token missing {claim}"),
            Self::InvalidVersionClaim => "Invalid grantVersion in lock token".to_string(),
            Self::ScopeMismatch => "Lock token does not match the requested application".to_string(),
            Self::AlreadySubmitted => "Application has already been submitted".to_string(),
            Self::LockConflict => "Another applicant is currently editing this application".to_string(),
            Self::Storage(_) => "An internal server error occurred".to_string(),
        }
    }
}

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("payload too large")]
    PayloadTooLarge,

    /// Already logged where it happened; the detail is kept for debugging only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Lock(err) => err.status_code(),
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Lock(err) => err.public_message(),
            Self::Unauthorized(msg) | Self::NotFound(msg) => (*msg).to_string(),
            Self::BadRequest(msg) => msg.clone(),
            Self::PayloadTooLarge => "Request payload is too large".to_string(),
            Self::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

/// JSON error body: `{"statusCode": 423, "error": "Locked", "message": "..."}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub error: &'static str,
    pub message: String,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: String) -> Self {
        Self {
            status_code: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error"),
            message,
        }
    }
}

impl IntoResponse for LockError {
    fn into_response(self) -> Response {
        ApiError::Lock(self).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorBody::new(status, self.public_message()))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Startup and wiring failures.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "tests/errors_tests.rs"]
mod tests;
