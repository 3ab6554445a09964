//! SQLite queries for student preferences and the teacher roster

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::models::{PreferencesInput, RosterEntry, StudentPreferences};
use super::PreferenceError;
use crate::auth::{Database, Role};

#[derive(Clone)]
pub struct PreferenceStore {
    db: Database,
}

impl PreferenceStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get(&self, user_id: i64) -> Result<Option<StudentPreferences>, PreferenceError> {
        let row = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT favorite_subjects, dreams, dream_job, created_at, updated_at
                     FROM student_preferences WHERE user_id = ?1",
                    params![user_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    },
                )
                .optional()?)
        })?;

        Ok(row.map(
            |(subjects, dreams, dream_job, created_at, updated_at)| StudentPreferences {
                favorite_subjects: parse_subjects(user_id, Some(&subjects)),
                dreams,
                dream_job,
                created_at: Some(created_at),
                updated_at: Some(updated_at),
            },
        ))
    }

    /// Create or replace a student's preferences, keeping the original `created_at`
    pub fn upsert(
        &self,
        user_id: i64,
        input: &PreferencesInput,
    ) -> Result<StudentPreferences, PreferenceError> {
        input.validate()?;
        let subjects = serde_json::to_string(&input.favorite_subjects)?;

        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO student_preferences (user_id, favorite_subjects, dreams, dream_job, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                    favorite_subjects = excluded.favorite_subjects,
                    dreams = excluded.dreams,
                    dream_job = excluded.dream_job,
                    updated_at = excluded.updated_at",
                params![user_id, subjects, input.dreams, input.dream_job, now],
            )?;
            Ok(())
        })?;

        self.get(user_id)?
            .ok_or_else(|| PreferenceError::Internal(format!("preferences for {user_id} vanished")))
    }

    /// Every student with their preferences, if any
    pub fn roster(&self) -> Result<Vec<RosterEntry>, PreferenceError> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, sp.favorite_subjects, sp.dreams, sp.dream_job,
                        sp.created_at, sp.updated_at
                 FROM users u
                 LEFT JOIN student_preferences sp ON u.id = sp.user_id
                 WHERE u.role = ?1
                 ORDER BY u.id",
            )?;
            let rows = stmt
                .query_map(params![Role::Student.as_str()], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        Ok(rows
            .into_iter()
            .map(
                |(user_id, username, subjects, dreams, dream_job, created, updated)| RosterEntry {
                    user_id,
                    username,
                    favorite_subjects: parse_subjects(user_id, subjects.as_deref()),
                    dreams,
                    dream_job,
                    preferences_created_at: created,
                    preferences_updated_at: updated,
                },
            )
            .collect())
    }

    /// Preferences of a specific student, as seen by a teacher
    pub fn for_student(
        &self,
        student_id: i64,
    ) -> Result<Option<StudentPreferences>, PreferenceError> {
        let role = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT role FROM users WHERE id = ?1",
                    params![student_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?)
        })?;

        match role.as_deref().map(Role::parse) {
            None => Err(PreferenceError::StudentNotFound),
            Some(Some(Role::Student)) => self.get(student_id),
            Some(_) => Err(PreferenceError::NotAStudent),
        }
    }
}

fn parse_subjects(user_id: i64, raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(subjects) => subjects,
        Err(e) => {
            log::error!(
                "Error parsing favorite_subjects from DB. UserID: {} Value: {} Error: {}",
                user_id,
                raw,
                e
            );
            Vec::new()
        }
    }
}
