//! Brute-force lockout decisions
//!
//! Pure functions over a loaded [`UserAccount`]. The guard never touches
//! storage; `AuthService` persists whatever it decides.

use chrono::{DateTime, Duration, Utc};

use super::models::UserAccount;
use crate::config::MAX_LIFETIME_DAYS;

/// Default number of consecutive failures before an account is locked
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout window, in minutes
pub const DEFAULT_LOCKOUT_MINUTES: i64 = 15;

/// Outcome of the admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Locked { retry_after_minutes: i64 },
}

/// Failure state to persist after a wrong password
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureState {
    pub attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
}

impl FailureState {
    pub fn is_locked(&self) -> bool {
        self.lockout_until.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LockoutGuard {
    max_attempts: u32,
    lockout_duration: Duration,
}

impl Default for LockoutGuard {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
        )
    }
}

impl LockoutGuard {
    /// `lockout_duration` is clamped to [`MAX_LIFETIME_DAYS`] so the stored
    /// timestamp stays representable.
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            lockout_duration: lockout_duration.min(Duration::days(MAX_LIFETIME_DAYS)),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn lockout_duration(&self) -> Duration {
        self.lockout_duration
    }

    /// Locked only while `lockout_until` lies in the future. A stale
    /// timestamp admits the attempt and is left for `on_success` to clear.
    pub fn check_admission(&self, account: &UserAccount, now: DateTime<Utc>) -> Admission {
        match account.lockout_until {
            Some(until) if until > now => Admission::Locked {
                retry_after_minutes: ceil_minutes(until - now),
            },
            _ => Admission::Admitted,
        }
    }

    pub fn on_failure(&self, account: &UserAccount, now: DateTime<Utc>) -> FailureState {
        let attempts = account.failed_login_attempts.saturating_add(1);
        let lockout_until = if attempts >= self.max_attempts {
            now.checked_add_signed(self.lockout_duration)
                .or(Some(DateTime::<Utc>::MAX_UTC))
        } else {
            None
        };
        FailureState {
            attempts,
            lockout_until,
        }
    }

    /// Whether a successful login must reset the stored failure state
    pub fn on_success(&self, account: &UserAccount) -> bool {
        account.failed_login_attempts > 0 || account.lockout_until.is_some()
    }
}

fn ceil_minutes(remaining: Duration) -> i64 {
    let millis = remaining.num_milliseconds().max(0);
    (millis + 59_999) / 60_000
}
