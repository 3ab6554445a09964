//! Authentication module
//!
//! Credential and session management:
//! - Password policy and Argon2id hashing
//! - SQLite account storage with lockout counters
//! - Brute-force lockout decisions
//! - Signed JWT sessions
//! - Session verification and role gating

pub mod database;
pub mod error;
pub mod gate;
pub mod jwt;
pub mod lockout;
pub mod models;
pub mod password;
pub mod service;

pub use database::{CredentialStore, Database, StoreError};
pub use error::{AuthError, UnauthenticatedReason};
pub use gate::{AccessGate, LOGGED_OUT_SENTINEL};
pub use jwt::{IssuedSession, SessionIssuer, VerificationError};
pub use lockout::{Admission, FailureState, LockoutGuard};
pub use models::*;
pub use password::{validate_password, HashCost, PolicyViolation};
pub use service::AuthService;
