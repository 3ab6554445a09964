//! Signed session tokens (HS256 JWT)

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};

use super::models::{Claims, Role};

/// A freshly minted token and its expiry
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// Unparseable, wrong signature, or carries unknown claims values
    #[error("malformed session token")]
    Malformed,

    #[error("session token expired")]
    Expired,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to sign session token: {0}")]
pub struct SigningError(#[from] jsonwebtoken::errors::Error);

/// Mints and verifies session tokens with the process-wide secret
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validity: Duration,
}

impl SessionIssuer {
    pub fn new(secret: &[u8], validity: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validity,
        }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    pub fn issue(
        &self,
        user_id: i64,
        username: &str,
        role: Role,
    ) -> Result<IssuedSession, SigningError> {
        self.issue_at(user_id, username, role, Utc::now())
    }

    /// Issue a token as if it were `now`
    pub fn issue_at(
        &self,
        user_id: i64,
        username: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, SigningError> {
        let expires_at = now
            .checked_add_signed(self.validity)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            iat: now.timestamp().max(0) as u64,
            exp: expires_at.timestamp().max(0) as u64,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(IssuedSession { token, expires_at })
    }

    /// Verify signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<Claims, VerificationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => VerificationError::Expired,
                _ => VerificationError::Malformed,
            }
        })?;

        if data.claims.user_id().is_none() {
            return Err(VerificationError::Malformed);
        }
        Ok(data.claims)
    }
}
