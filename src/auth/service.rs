//! Register / login / change-password orchestration
//!
//! `AuthService` is the only place where lockout decisions are sequenced with
//! store writes. Argon2 work runs on the blocking pool and never holds the
//! connection lock.

use chrono::Utc;

use super::database::CredentialStore;
use super::error::AuthError;
use super::jwt::SessionIssuer;
use super::lockout::{Admission, LockoutGuard};
use super::models::{AuthSession, Identity, Role, UserAccount, MAX_USERNAME_LENGTH};
use super::password::{hash_password, validate_password, verify_password, HashCost, HashError};
use crate::config::AuthConfig;

#[derive(Clone)]
pub struct AuthService {
    store: CredentialStore,
    sessions: SessionIssuer,
    guard: LockoutGuard,
    hash_cost: HashCost,
}

impl AuthService {
    pub fn new(
        store: CredentialStore,
        sessions: SessionIssuer,
        guard: LockoutGuard,
        hash_cost: HashCost,
    ) -> Self {
        Self {
            store,
            sessions,
            guard,
            hash_cost,
        }
    }

    pub fn from_config(store: CredentialStore, config: &AuthConfig) -> Self {
        Self::new(
            store,
            SessionIssuer::new(config.jwt_secret.as_bytes(), config.session_ttl),
            LockoutGuard::new(config.max_login_attempts, config.lockout_duration),
            config.hash_cost,
        )
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    pub fn guard(&self) -> &LockoutGuard {
        &self.guard
    }

    /// Self-service registration. Always creates a student.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        origin: &str,
    ) -> Result<AuthSession, AuthError> {
        let account = self
            .provision(username, password, Role::Student)
            .await
            .inspect_err(|e| {
                if matches!(e, AuthError::DuplicateUsername) {
                    log::info!(
                        "Registration rejected - username taken: {} from IP: {}",
                        username,
                        origin
                    );
                }
            })?;

        log::info!(
            "SECURITY: User registered: {} (ID: {}) from IP: {}",
            account.username,
            account.id,
            origin
        );
        self.open_session(&account)
    }

    /// Validate, hash and store a new account with the given role
    pub async fn provision(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<UserAccount, AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "Username and password are required".to_string(),
            ));
        }
        if username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(AuthError::InvalidInput(format!(
                "Username cannot exceed {} characters.",
                MAX_USERNAME_LENGTH
            )));
        }
        if let Some(violation) = validate_password(password) {
            return Err(AuthError::WeakPassword(violation));
        }

        let password_hash = self.hash(password).await?;
        Ok(self.store.create(username, &password_hash, role)?)
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        origin: &str,
    ) -> Result<AuthSession, AuthError> {
        if username.is_empty() || password.is_empty() {
            log::warn!(
                "SECURITY: Login failed - Missing credentials from IP: {}",
                origin
            );
            return Err(AuthError::InvalidInput(
                "Please provide username and password".to_string(),
            ));
        }

        let Some(account) = self.store.find_by_username(username)? else {
            log::warn!(
                "SECURITY: Login failed - User not found: {} from IP: {}",
                username,
                origin
            );
            return Err(AuthError::InvalidCredentials);
        };

        let now = Utc::now();
        if let Admission::Locked {
            retry_after_minutes,
        } = self.guard.check_admission(&account, now)
        {
            log::warn!(
                "SECURITY: Login failed - Account locked out: {} from IP: {}. Lockout ends at {:?}.",
                username,
                origin,
                account.lockout_until
            );
            return Err(AuthError::LockedOut {
                retry_after_minutes,
            });
        }

        if !self.verify(password, &account.password_hash).await? {
            let failure = self.guard.on_failure(&account, now);
            self.store
                .record_failed_attempt(account.id, failure.attempts, failure.lockout_until)?;

            match failure.lockout_until {
                Some(until) => log::warn!(
                    "SECURITY: Login failed - User locked out: {} from IP: {} after {} attempts. Lockout until {}",
                    username,
                    origin,
                    failure.attempts,
                    until
                ),
                None => log::warn!(
                    "SECURITY: Login failed - Incorrect password for user: {} from IP: {}. Failed attempts: {}",
                    username,
                    origin,
                    failure.attempts
                ),
            }
            return Err(AuthError::InvalidCredentials);
        }

        if self.guard.on_success(&account) {
            self.store.reset_failure_state(account.id)?;
            log::info!(
                "SECURITY: User logged in successfully: {} (ID: {}) from IP: {}. Failed attempts reset.",
                username,
                account.id,
                origin
            );
        } else {
            log::info!(
                "SECURITY: User logged in successfully: {} (ID: {}) from IP: {}.",
                username,
                account.id,
                origin
            );
        }

        self.open_session(&account)
    }

    /// Change the caller's password. On success the boundary must clear the
    /// caller's session cookie; other sessions stay valid until they expire.
    pub async fn change_password(
        &self,
        caller: &Identity,
        current_password: &str,
        new_password: &str,
        confirm_new_password: &str,
        origin: &str,
    ) -> Result<(), AuthError> {
        if current_password.is_empty() || new_password.is_empty() || confirm_new_password.is_empty()
        {
            return Err(AuthError::InvalidInput(
                "Please provide current password, new password, and confirm password."
                    .to_string(),
            ));
        }
        if new_password != confirm_new_password {
            return Err(AuthError::Mismatch);
        }
        if let Some(violation) = validate_password(new_password) {
            return Err(AuthError::WeakPassword(violation));
        }

        let Some(account) = self.store.find_by_id(caller.id)? else {
            log::error!(
                "SECURITY: Password change failed - User with ID {} not found during password change from IP: {}.",
                caller.id,
                origin
            );
            return Err(AuthError::UserVanished(caller.id));
        };

        if !self.verify(current_password, &account.password_hash).await? {
            log::warn!(
                "SECURITY: Password change failed - Incorrect current password for user {} (ID: {}) from IP: {}.",
                caller.username,
                caller.id,
                origin
            );
            return Err(AuthError::WrongCurrentPassword);
        }

        if self.verify(new_password, &account.password_hash).await? {
            log::warn!(
                "SECURITY: Password change failed - New password is same as current for user {} (ID: {}) from IP: {}.",
                caller.username,
                caller.id,
                origin
            );
            return Err(AuthError::SamePassword);
        }

        let new_hash = self.hash(new_password).await?;
        self.store.update_password_hash(account.id, &new_hash)?;

        log::info!(
            "SECURITY: Password changed successfully for user {} (ID: {}) from IP: {}.",
            caller.username,
            caller.id,
            origin
        );
        Ok(())
    }

    fn open_session(&self, account: &UserAccount) -> Result<AuthSession, AuthError> {
        let issued = self
            .sessions
            .issue(account.id, &account.username, account.role)?;
        Ok(AuthSession {
            token: issued.token,
            expires_at: issued.expires_at,
            identity: account.identity(),
        })
    }

    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_owned();
        let cost = self.hash_cost;
        run_blocking(move || hash_password(&password, &cost)).await
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        run_blocking(move || verify_password(&password, &hash)).await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, HashError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Task(e.to_string()))?
        .map_err(AuthError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::database::Database;
    use crate::auth::password::PolicyViolation;
    use assert_matches::assert_matches;
    use chrono::Duration;

    const ORIGIN: &str = "127.0.0.1";

    fn service() -> AuthService {
        AuthService::new(
            CredentialStore::new(Database::in_memory().unwrap()),
            SessionIssuer::new(b"unit-test-secret-unit-test-secret", Duration::hours(1)),
            LockoutGuard::default(),
            HashCost::minimal(),
        )
    }

    #[tokio::test]
    async fn test_register_issues_student_session() {
        let auth = service();
        let session = auth.register("alice", "Str0ng!Pass", ORIGIN).await.unwrap();

        assert_eq!(session.identity.username, "alice");
        assert_eq!(session.identity.role, Role::Student);

        let claims = auth.sessions().verify(&session.token).unwrap();
        assert_eq!(claims.user_id(), Some(session.identity.id));
        assert_eq!(claims.role, Role::Student);
    }

    #[tokio::test]
    async fn test_register_validation_order() {
        let auth = service();
        assert_matches!(
            auth.register("", "Str0ng!Pass", ORIGIN).await,
            Err(AuthError::InvalidInput(_))
        );
        assert_matches!(
            auth.register("bob", "", ORIGIN).await,
            Err(AuthError::InvalidInput(_))
        );
        assert_matches!(
            auth.register(&"x".repeat(51), "Str0ng!Pass", ORIGIN).await,
            Err(AuthError::InvalidInput(msg)) if msg.contains("50")
        );
        assert!(auth.register(&"x".repeat(50), "Str0ng!Pass", ORIGIN).await.is_ok());
        assert_matches!(
            auth.register("bob", "password", ORIGIN).await,
            Err(AuthError::WeakPassword(PolicyViolation::MissingUppercase))
        );
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let auth = service();
        auth.register("alice", "Str0ng!Pass", ORIGIN).await.unwrap();
        assert_matches!(
            auth.register("alice", "An0ther!Pass", ORIGIN).await,
            Err(AuthError::DuplicateUsername)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_creates_one_account() {
        let auth = service();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let auth = auth.clone();
            handles.push(tokio::spawn(async move {
                auth.register("racer", "Str0ng!Pass", ORIGIN).await
            }));
        }

        let mut created = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(AuthError::DuplicateUsername) => duplicates += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(duplicates, 7);
    }

    #[tokio::test]
    async fn test_login_unknown_user_and_wrong_password_look_alike() {
        let auth = service();
        auth.register("alice", "Str0ng!Pass", ORIGIN).await.unwrap();

        let unknown = auth.login("nobody", "Str0ng!Pass", ORIGIN).await.unwrap_err();
        let wrong = auth.login("alice", "wrong", ORIGIN).await.unwrap_err();
        assert_matches!(unknown, AuthError::InvalidCredentials);
        assert_matches!(wrong, AuthError::InvalidCredentials);
        assert_eq!(unknown.client_message(), wrong.client_message());
    }

    #[tokio::test]
    async fn test_login_missing_fields() {
        let auth = service();
        assert_matches!(
            auth.login("", "x", ORIGIN).await,
            Err(AuthError::InvalidInput(_))
        );
        assert_matches!(
            auth.login("alice", "", ORIGIN).await,
            Err(AuthError::InvalidInput(_))
        );
    }

    #[tokio::test]
    async fn test_lockout_after_max_attempts() {
        let auth = service();
        auth.register("alice", "Str0ng!Pass", ORIGIN).await.unwrap();

        for _ in 0..4 {
            assert_matches!(
                auth.login("alice", "wrong", ORIGIN).await,
                Err(AuthError::InvalidCredentials)
            );
        }
        let stored = auth.store().find_by_username("alice").unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 4);
        assert!(stored.lockout_until.is_none());

        // fifth failure still reports bad credentials but locks the account
        assert_matches!(
            auth.login("alice", "wrong", ORIGIN).await,
            Err(AuthError::InvalidCredentials)
        );
        let stored = auth.store().find_by_username("alice").unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 5);
        let remaining = stored.lockout_until.unwrap() - Utc::now();
        assert!(remaining > Duration::minutes(14));
        assert!(remaining <= Duration::minutes(15));

        // correct password during lockout is refused
        assert_matches!(
            auth.login("alice", "Str0ng!Pass", ORIGIN).await,
            Err(AuthError::LockedOut {
                retry_after_minutes: 15
            })
        );
        // and the refusal does not count as a further failure
        let stored = auth.store().find_by_username("alice").unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 5);
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let auth = service();
        let session = auth.register("alice", "Str0ng!Pass", ORIGIN).await.unwrap();
        for _ in 0..3 {
            let _ = auth.login("alice", "wrong", ORIGIN).await;
        }

        auth.login("alice", "Str0ng!Pass", ORIGIN).await.unwrap();
        let stored = auth.store().find_by_id(session.identity.id).unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert!(stored.lockout_until.is_none());
    }

    #[tokio::test]
    async fn test_expired_lockout_is_cleared_on_success() {
        let auth = service();
        let session = auth.register("alice", "Str0ng!Pass", ORIGIN).await.unwrap();
        auth.store()
            .record_failed_attempt(
                session.identity.id,
                5,
                Some(Utc::now() - Duration::minutes(1)),
            )
            .unwrap();

        auth.login("alice", "Str0ng!Pass", ORIGIN).await.unwrap();
        let stored = auth.store().find_by_id(session.identity.id).unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert!(stored.lockout_until.is_none());
    }

    #[tokio::test]
    async fn test_change_password_flow() {
        let auth = service();
        let session = auth.register("alice", "Str0ng!Pass", ORIGIN).await.unwrap();
        let me = session.identity;

        assert_matches!(
            auth.change_password(&me, "", "N3w!Password", "N3w!Password", ORIGIN).await,
            Err(AuthError::InvalidInput(_))
        );
        assert_matches!(
            auth.change_password(&me, "Str0ng!Pass", "N3w!Password", "N3w!Passwort", ORIGIN)
                .await,
            Err(AuthError::Mismatch)
        );
        assert_matches!(
            auth.change_password(&me, "Str0ng!Pass", "weakpass", "weakpass", ORIGIN).await,
            Err(AuthError::WeakPassword(_))
        );
        assert_matches!(
            auth.change_password(&me, "Wr0ng!Pass", "N3w!Password", "N3w!Password", ORIGIN)
                .await,
            Err(AuthError::WrongCurrentPassword)
        );
        assert_matches!(
            auth.change_password(&me, "Str0ng!Pass", "Str0ng!Pass", "Str0ng!Pass", ORIGIN)
                .await,
            Err(AuthError::SamePassword)
        );

        auth.change_password(&me, "Str0ng!Pass", "N3w!Password", "N3w!Password", ORIGIN)
            .await
            .unwrap();

        assert_matches!(
            auth.login("alice", "Str0ng!Pass", ORIGIN).await,
            Err(AuthError::InvalidCredentials)
        );
        assert!(auth.login("alice", "N3w!Password", ORIGIN).await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_resets_failures() {
        let auth = service();
        let me = auth
            .register("alice", "Str0ng!Pass", ORIGIN)
            .await
            .unwrap()
            .identity;
        for _ in 0..2 {
            let _ = auth.login("alice", "wrong", ORIGIN).await;
        }

        auth.change_password(&me, "Str0ng!Pass", "N3w!Password", "N3w!Password", ORIGIN)
            .await
            .unwrap();
        let stored = auth.store().find_by_id(me.id).unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
    }

    #[tokio::test]
    async fn test_change_password_for_vanished_user() {
        let auth = service();
        let ghost = Identity {
            id: 404,
            username: "ghost".to_string(),
            role: Role::Student,
        };
        assert_matches!(
            auth.change_password(&ghost, "Str0ng!Pass", "N3w!Password", "N3w!Password", ORIGIN)
                .await,
            Err(AuthError::UserVanished(404))
        );
    }

    #[tokio::test]
    async fn test_provision_teacher() {
        let auth = service();
        let teacher = auth
            .provision("mr_smith", "Te4cher!Pass", Role::Teacher)
            .await
            .unwrap();
        assert_eq!(teacher.role, Role::Teacher);

        let session = auth.login("mr_smith", "Te4cher!Pass", ORIGIN).await.unwrap();
        assert_eq!(session.identity.role, Role::Teacher);
    }

    #[tokio::test]
    async fn test_oversized_lifetimes_do_not_panic() {
        let mut config = AuthConfig::new("unit-test-secret-unit-test-secret").unwrap();
        config.hash_cost = HashCost::minimal();
        config.session_ttl = Duration::seconds(10_000_000_000_000);
        config.lockout_duration = Duration::minutes(200_000_000_000);
        let auth = AuthService::from_config(
            CredentialStore::new(Database::in_memory().unwrap()),
            &config,
        );

        let session = auth.register("alice", "Str0ng!Pass", ORIGIN).await.unwrap();
        assert!(auth.sessions().verify(&session.token).is_ok());

        for _ in 0..5 {
            assert_matches!(
                auth.login("alice", "wrong", ORIGIN).await,
                Err(AuthError::InvalidCredentials)
            );
        }
        assert_matches!(
            auth.login("alice", "Str0ng!Pass", ORIGIN).await,
            Err(AuthError::LockedOut { .. })
        );
    }
}
