//! Authentication data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a username, in characters
pub const MAX_USERNAME_LENGTH: usize = 50;

/// Closed set of account roles. There is no hierarchy between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }

    /// Parse a stored role tag. Matching is exact; unknown tags are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted user account
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub failed_login_attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
}

impl UserAccount {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// Authenticated principal attached to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub username: String,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    /// Numeric user id carried in `sub`
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// API request/response types
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
    #[serde(default)]
    pub confirm_new_password: Option<String>,
}

/// Token plus the identity it was issued for
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: Identity,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub status: &'static str,
    pub token: String,
    pub data: UserEnvelope,
}

impl AuthResponse {
    pub fn success(session: AuthSession) -> Self {
        Self {
            status: "success",
            token: session.token,
            data: UserEnvelope {
                user: session.identity,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
        }
    }
}
