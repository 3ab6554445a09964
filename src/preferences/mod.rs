//! Student preferences and the teacher roster
//!
//! Plain parameterized CRUD on top of the shared [`Database`](crate::auth::Database).
//! Access control happens before these functions are reached.

pub mod models;
pub mod store;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::auth::{error::failure_body, StoreError};

pub use models::{PreferencesInput, RosterEntry, StudentPreferences};
pub use store::PreferenceStore;

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("{0}")]
    Invalid(String),

    #[error("Student not found")]
    StudentNotFound,

    #[error("User is not a student")]
    NotAStudent,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PreferenceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PreferenceError::Invalid(_) => StatusCode::BAD_REQUEST,
            PreferenceError::StudentNotFound => StatusCode::NOT_FOUND,
            PreferenceError::NotAStudent => StatusCode::FORBIDDEN,
            PreferenceError::Store(_) | PreferenceError::Json(_) | PreferenceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PreferenceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            log::error!("Preference request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        failure_body(status, message)
    }
}
