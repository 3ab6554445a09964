//! Password policy and hashing using Argon2

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use serde::Serialize;
use std::fmt;

/// Symbols accepted by the special-character rule
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

/// Minimum password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Reason a candidate password fails the strength rules, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PolicyViolation {
    TooShort,
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSymbol,
}

impl PolicyViolation {
    pub fn message(&self) -> &'static str {
        match self {
            PolicyViolation::TooShort => "Password must be at least 8 characters long.",
            PolicyViolation::MissingUppercase => {
                "Password must contain at least one uppercase letter."
            }
            PolicyViolation::MissingLowercase => {
                "Password must contain at least one lowercase letter."
            }
            PolicyViolation::MissingDigit => "Password must contain at least one number.",
            PolicyViolation::MissingSymbol => {
                "Password must contain at least one special character (!@#$%^&*()...)."
            }
        }
    }
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Validate password strength. The first failing rule wins.
pub fn validate_password(password: &str) -> Option<PolicyViolation> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Some(PolicyViolation::TooShort);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Some(PolicyViolation::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Some(PolicyViolation::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Some(PolicyViolation::MissingDigit);
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        return Some(PolicyViolation::MissingSymbol);
    }
    None
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl HashCost {
    /// Cheapest parameters argon2 accepts. Only meant for tests.
    pub fn minimal() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn hasher(&self) -> Result<Argon2<'static>, HashError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(HashError::Params)?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid argon2 parameters: {0}")]
    Params(argon2::Error),

    #[error("password hash failure: {0}")]
    Hash(argon2::password_hash::Error),
}

/// Hash a password using Argon2id with the given cost
pub fn hash_password(password: &str, cost: &HashCost) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = cost.hasher()?;
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(HashError::Hash)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash. The cost is read back from the PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, HashError> {
    let parsed_hash = PasswordHash::new(hash).map_err(HashError::Hash)?;
    let argon2 = Argon2::default();
    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(HashError::Hash(e)),
    }
}
