//! Session verification and role gating

use super::database::CredentialStore;
use super::error::{AuthError, UnauthenticatedReason};
use super::jwt::SessionIssuer;
use super::models::{Identity, Role};

/// Cookie value written on logout
pub const LOGGED_OUT_SENTINEL: &str = "loggedout";

/// Resolves a session token into an [`Identity`]
#[derive(Clone)]
pub struct AccessGate {
    sessions: SessionIssuer,
    store: CredentialStore,
}

impl AccessGate {
    pub fn new(sessions: SessionIssuer, store: CredentialStore) -> Self {
        Self { sessions, store }
    }

    pub fn authenticate(&self, token: Option<&str>, origin: &str) -> Result<Identity, AuthError> {
        let token = match token {
            Some(t) if !t.is_empty() && t != LOGGED_OUT_SENTINEL => t,
            _ => {
                log::warn!(
                    "SECURITY: Authentication failed - No token provided or logged out. IP: {}",
                    origin
                );
                return Err(AuthError::Unauthenticated(UnauthenticatedReason::Missing));
            }
        };

        let claims = self.sessions.verify(token).map_err(|e| {
            log::warn!(
                "SECURITY: Authentication failed - Token verification error: {}. IP: {}",
                e,
                origin
            );
            AuthError::Unauthenticated(e.into())
        })?;

        // verify() already rejects a non-numeric subject
        let user_id = claims
            .user_id()
            .ok_or(AuthError::Unauthenticated(UnauthenticatedReason::Malformed))?;

        match self.store.find_by_id(user_id)? {
            Some(account) => Ok(account.identity()),
            None => {
                log::warn!(
                    "SECURITY: Authentication failed - User from token not found. Token ID: {}, IP: {}",
                    user_id,
                    origin
                );
                Err(AuthError::Unauthenticated(UnauthenticatedReason::UserGone))
            }
        }
    }

    /// Plain membership test; no role implies another
    pub fn authorize(identity: &Identity, allowed: &[Role], origin: &str) -> Result<(), AuthError> {
        if allowed.contains(&identity.role) {
            return Ok(());
        }
        log::warn!(
            "SECURITY: Authorization failed - User {} (ID: {}) with role '{}' attempted to access restricted route. Allowed roles: {}. IP: {}",
            identity.username,
            identity.id,
            identity.role,
            allowed
                .iter()
                .map(Role::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            origin
        );
        Err(AuthError::Forbidden)
    }
}
