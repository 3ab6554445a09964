//! Authentication error taxonomy and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::database::StoreError;
use super::jwt::{SigningError, VerificationError};
use super::password::{HashError, PolicyViolation};

/// Why a request carried no usable session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    Missing,
    Malformed,
    Expired,
    UserGone,
}

impl From<VerificationError> for UnauthenticatedReason {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::Malformed => UnauthenticatedReason::Malformed,
            VerificationError::Expired => UnauthenticatedReason::Expired,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("weak password: {0}")]
    WeakPassword(PolicyViolation),

    #[error("new password and confirmation do not match")]
    Mismatch,

    #[error("new password equals the current password")]
    SamePassword,

    #[error("username already exists")]
    DuplicateUsername,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account locked for {retry_after_minutes} more minute(s)")]
    LockedOut { retry_after_minutes: i64 },

    #[error("unauthenticated: {0:?}")]
    Unauthenticated(UnauthenticatedReason),

    #[error("incorrect current password")]
    WrongCurrentPassword,

    #[error("forbidden")]
    Forbidden,

    #[error("authenticated user {0} no longer exists")]
    UserVanished(i64),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateUsername => AuthError::DuplicateUsername,
            other => AuthError::Store(other),
        }
    }
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidInput(_)
            | AuthError::WeakPassword(_)
            | AuthError::Mismatch
            | AuthError::SamePassword => StatusCode::BAD_REQUEST,
            AuthError::DuplicateUsername => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::LockedOut { .. }
            | AuthError::Unauthenticated(_)
            | AuthError::WrongCurrentPassword => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::UserVanished(_)
            | AuthError::Store(_)
            | AuthError::Hash(_)
            | AuthError::Signing(_)
            | AuthError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client. Internal detail never leaves the server.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::InvalidInput(msg) => msg.clone(),
            AuthError::WeakPassword(violation) => violation.message().to_string(),
            AuthError::Mismatch => "New password and confirm password do not match.".to_string(),
            AuthError::SamePassword => {
                "New password cannot be the same as the current password.".to_string()
            }
            AuthError::DuplicateUsername => "Username already exists".to_string(),
            AuthError::InvalidCredentials => "Incorrect username or password".to_string(),
            AuthError::LockedOut {
                retry_after_minutes,
            } => format!(
                "Too many failed login attempts. Please try again in {} minutes.",
                retry_after_minutes
            ),
            AuthError::Unauthenticated(UnauthenticatedReason::Expired) => {
                "Your token has expired! Please log in again.".to_string()
            }
            AuthError::Unauthenticated(UnauthenticatedReason::UserGone) => {
                "The user belonging to this token does no longer exist.".to_string()
            }
            AuthError::Unauthenticated(_) => {
                "You are not logged in! Please log in to get access.".to_string()
            }
            AuthError::WrongCurrentPassword => "Incorrect current password.".to_string(),
            AuthError::Forbidden => {
                "You do not have permission to perform this action".to_string()
            }
            AuthError::UserVanished(_)
            | AuthError::Store(_)
            | AuthError::Hash(_)
            | AuthError::Signing(_)
            | AuthError::Task(_) => "Internal server error".to_string(),
        }
    }
}

/// `{status, message}` body shared by every failure response
pub fn failure_body(status: StatusCode, message: String) -> Response {
    let label = if status.is_server_error() { "error" } else { "fail" };
    (status, Json(json!({ "status": label, "message": message }))).into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Internal authentication failure: {}", self);
        }
        failure_body(status, self.client_message())
    }
}
