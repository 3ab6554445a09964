//! SQLite storage for accounts and their lockout counters

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::models::{Role, UserAccount};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("username already exists")]
    DuplicateUsername,

    #[error("database connection lock poisoned")]
    Poisoned,

    #[error("corrupt row in {table}: {detail}")]
    CorruptRow { table: &'static str, detail: String },
}

/// Shared database connection wrapper
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file and initialize tables
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create in-memory database (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_tables()?;
        Ok(db)
    }

    fn init_tables(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                PRAGMA foreign_keys = ON;

                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'student'
                        CHECK (role IN ('student', 'teacher')),
                    failed_login_attempts INTEGER NOT NULL DEFAULT 0,
                    lockout_until TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS student_preferences (
                    user_id INTEGER PRIMARY KEY,
                    favorite_subjects TEXT NOT NULL DEFAULT '[]',
                    dreams TEXT NOT NULL DEFAULT '',
                    dream_job TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
                "#,
            )?;
            Ok(())
        })
    }

    /// Run `f` with exclusive access to the connection
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }
}

const USER_COLUMNS: &str =
    "id, username, password_hash, role, failed_login_attempts, lockout_until";

/// Persisted user records. The only core component touching storage.
#[derive(Clone)]
pub struct CredentialStore {
    db: Database,
}

impl CredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Insert a new account. Uniqueness is enforced by the UNIQUE
    /// constraint, so concurrent inserts cannot both succeed.
    pub fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserAccount, StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            let inserted = conn.execute(
                "INSERT INTO users (username, password_hash, role, failed_login_attempts, lockout_until, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, NULL, ?4, ?4)",
                params![username, password_hash, role.as_str(), now],
            );

            match inserted {
                Ok(_) => Ok(UserAccount {
                    id: conn.last_insert_rowid(),
                    username: username.to_string(),
                    password_hash: password_hash.to_string(),
                    role,
                    failed_login_attempts: 0,
                    lockout_until: None,
                }),
                Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateUsername),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Find user by username (case-sensitive)
    pub fn find_by_username(&self, username: &str) -> Result<Option<UserAccount>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
            let row = conn
                .query_row(&sql, params![username], RawAccount::from_row)
                .optional()?;
            row.map(RawAccount::into_account).transpose()
        })
    }

    /// Find user by ID
    pub fn find_by_id(&self, id: i64) -> Result<Option<UserAccount>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            let row = conn
                .query_row(&sql, params![id], RawAccount::from_row)
                .optional()?;
            row.map(RawAccount::into_account).transpose()
        })
    }

    /// Persist failure state after a wrong password. A `None` lockout leaves
    /// any stored timestamp untouched.
    pub fn record_failed_attempt(
        &self,
        id: i64,
        attempts: u32,
        lockout_until: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            match lockout_until {
                Some(until) => conn.execute(
                    "UPDATE users SET failed_login_attempts = ?1, lockout_until = ?2, updated_at = ?3 WHERE id = ?4",
                    params![attempts, until.to_rfc3339(), now, id],
                )?,
                None => conn.execute(
                    "UPDATE users SET failed_login_attempts = ?1, updated_at = ?2 WHERE id = ?3",
                    params![attempts, now, id],
                )?,
            };
            Ok(())
        })
    }

    pub fn reset_failure_state(&self, id: i64) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET failed_login_attempts = 0, lockout_until = NULL, updated_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id],
            )?;
            Ok(())
        })
    }

    /// Replace the password hash and reset failure state in one statement
    pub fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET password_hash = ?1, failed_login_attempts = 0, lockout_until = NULL, updated_at = ?2
                 WHERE id = ?3",
                params![password_hash, Utc::now().to_rfc3339(), id],
            )?;
            Ok(())
        })
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.code == ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

/// Row as stored, before role and timestamp are checked
struct RawAccount {
    id: i64,
    username: String,
    password_hash: String,
    role: String,
    failed_login_attempts: i64,
    lockout_until: Option<String>,
}

impl RawAccount {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            role: row.get(3)?,
            failed_login_attempts: row.get(4)?,
            lockout_until: row.get(5)?,
        })
    }

    fn into_account(self) -> Result<UserAccount, StoreError> {
        let role = Role::parse(&self.role).ok_or_else(|| StoreError::CorruptRow {
            table: "users",
            detail: format!("unknown role '{}' for user {}", self.role, self.id),
        })?;

        let lockout_until = self
            .lockout_until
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| StoreError::CorruptRow {
                        table: "users",
                        detail: format!("bad lockout_until '{}' for user {}: {}", raw, self.id, e),
                    })
            })
            .transpose()?;

        Ok(UserAccount {
            id: self.id,
            username: self.username,
            password_hash: self.password_hash,
            role,
            failed_login_attempts: u32::try_from(self.failed_login_attempts).unwrap_or(0),
            lockout_until,
        })
    }
}
