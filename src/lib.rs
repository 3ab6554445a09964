//! # Preferences Portal
//!
//! Backend for a small school portal where students record their favorite
//! subjects and ambitions, and teachers review them.
//!
//! ## Features
//!
//! - **Credentials**: password policy, Argon2id hashing, per-account lockout
//! - **Sessions**: HS256 tokens delivered in an HTTP-only cookie
//! - **Access control**: session verification and role gating for routes
//! - **Preferences**: student self-service and a teacher roster
//!
//! ## Usage
//!
//! ```rust,no_run
//! use prefs_portal::{
//!     auth::Database,
//!     config::{AuthConfig, ServerConfig},
//!     servers::{ApiServer, AppState},
//! };
//!
//! # async fn run() -> prefs_portal::Result<()> {
//! let server_config = ServerConfig::default();
//! let db = Database::open(&server_config.database_path)?;
//! let auth_config = AuthConfig::new(std::env::var("JWT_SECRET").unwrap_or_default())?;
//! let state = AppState::new(db, &auth_config, server_config.auth_rate_limit);
//! ApiServer::new(server_config, state).start().await
//! # }
//! ```

// ============================================================================
// PUBLIC API MODULES
// ============================================================================

/// Credentials, sessions and access control
pub mod auth;

/// Runtime configuration
pub mod config;

/// Logger setup
pub mod logging;

/// Student preferences and the teacher roster
pub mod preferences;

/// HTTP server components
pub mod servers;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use auth::{AccessGate, AuthError, AuthService, Identity, Role};
pub use config::{AuthConfig, ConfigError, ServerConfig};
pub use servers::{ApiServer, AppState};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Top-level error for startup and server lifecycle failures
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] auth::StoreError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Logging error: {0}")]
    Logging(#[from] flexi_logger::FlexiLoggerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PortalError>;

// ============================================================================
// LIBRARY VERSION INFO
// ============================================================================

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
