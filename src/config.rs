//! Immutable runtime configuration, built once at startup

use chrono::Duration;
use std::path::PathBuf;

use crate::auth::lockout::{DEFAULT_LOCKOUT_MINUTES, DEFAULT_MAX_ATTEMPTS};
use crate::auth::password::HashCost;

/// Shortest signing secret accepted at startup, in bytes
pub const MIN_SECRET_LENGTH: usize = 32;

/// Upper bound for session, cookie and lockout lifetimes, in days
pub const MAX_LIFETIME_DAYS: i64 = 365;

/// Longest auth request-limit window, in seconds
pub const MAX_RATE_LIMIT_WINDOW_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT_SECRET is not set")]
    MissingSecret,

    #[error("JWT_SECRET must be at least {MIN_SECRET_LENGTH} bytes long")]
    SecretTooShort,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Credential and session settings
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub cookie_ttl: Duration,
    pub secure_cookies: bool,
    pub max_login_attempts: u32,
    pub lockout_duration: Duration,
    pub hash_cost: HashCost,
}

impl AuthConfig {
    /// Defaults for everything but the secret
    pub fn new(jwt_secret: impl Into<String>) -> Result<Self, ConfigError> {
        let jwt_secret = jwt_secret.into();
        if jwt_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if jwt_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::SecretTooShort);
        }
        Ok(Self {
            jwt_secret,
            session_ttl: Duration::hours(1),
            cookie_ttl: Duration::hours(1),
            secure_cookies: false,
            max_login_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_duration: Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
            hash_cost: HashCost::default(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl <= Duration::zero() {
            return Err(ConfigError::Invalid("session lifetime must be positive".into()));
        }
        if self.cookie_ttl <= Duration::zero() {
            return Err(ConfigError::Invalid("cookie lifetime must be positive".into()));
        }
        if self.max_login_attempts == 0 {
            return Err(ConfigError::Invalid("max login attempts must be at least 1".into()));
        }
        if self.lockout_duration <= Duration::zero() {
            return Err(ConfigError::Invalid("lockout duration must be positive".into()));
        }
        let cap = Duration::days(MAX_LIFETIME_DAYS);
        for (name, value) in [
            ("session lifetime", self.session_ttl),
            ("cookie lifetime", self.cookie_ttl),
            ("lockout duration", self.lockout_duration),
        ] {
            if value > cap {
                return Err(ConfigError::Invalid(format!(
                    "{name} cannot exceed {MAX_LIFETIME_DAYS} days"
                )));
            }
        }
        Ok(())
    }
}

/// Build a duration from a raw setting, rejecting values chrono cannot represent
///
/// ```
/// use chrono::Duration;
/// use prefs_portal::config::checked_duration;
///
/// assert!(checked_duration("LOCKOUT_MINUTES", 15, Duration::try_minutes).is_ok());
/// assert!(checked_duration("LOCKOUT_MINUTES", i64::MAX, Duration::try_minutes).is_err());
/// ```
pub fn checked_duration(
    name: &str,
    value: i64,
    make: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    make(value).ok_or_else(|| ConfigError::Invalid(format!("{name} is out of range: {value}")))
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("cookie_ttl", &self.cookie_ttl)
            .field("secure_cookies", &self.secure_cookies)
            .field("max_login_attempts", &self.max_login_attempts)
            .field("lockout_duration", &self.lockout_duration)
            .field("hash_cost", &self.hash_cost)
            .finish()
    }
}

/// Per-IP limit on the register/login endpoints
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: std::time::Duration,
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::Invalid(
                "auth request limit must allow at least 1 request".into(),
            ));
        }
        if self.window.is_zero()
            || self.window > std::time::Duration::from_secs(MAX_RATE_LIMIT_WINDOW_SECS)
        {
            return Err(ConfigError::Invalid(format!(
                "auth request window must be between 1 and {MAX_RATE_LIMIT_WINDOW_SECS} seconds"
            )));
        }
        Ok(())
    }

    /// Window length as shown to clients, rounded up to whole minutes
    pub fn window_minutes(&self) -> u64 {
        self.window.as_secs().div_ceil(60).max(1)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: std::time::Duration::from_secs(15 * 60),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub database_path: PathBuf,
    pub auth_rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            frontend_url: "http://localhost:5173".to_string(),
            database_path: PathBuf::from("data/prefs_portal.db"),
            auth_rate_limit: RateLimitConfig::default(),
        }
    }
}
