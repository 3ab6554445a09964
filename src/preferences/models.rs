use serde::{Deserialize, Serialize};

use super::PreferenceError;

pub const MAX_DREAMS_LENGTH: usize = 500;
pub const MAX_DREAM_JOB_LENGTH: usize = 100;
pub const MAX_SUBJECT_LENGTH: usize = 50;

/// A student's saved preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudentPreferences {
    pub favorite_subjects: Vec<String>,
    pub dreams: String,
    pub dream_job: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Body of `POST /api/students/preferences`
#[derive(Debug, Clone, Deserialize)]
pub struct PreferencesInput {
    #[serde(rename = "favoriteSubjects")]
    pub favorite_subjects: Vec<String>,
    pub dreams: String,
    pub dream_job: String,
}

impl PreferencesInput {
    pub fn validate(&self) -> Result<(), PreferenceError> {
        if self.dreams.chars().count() > MAX_DREAMS_LENGTH {
            return Err(PreferenceError::Invalid(format!(
                "Dreams cannot exceed {MAX_DREAMS_LENGTH} characters."
            )));
        }
        if self.dream_job.chars().count() > MAX_DREAM_JOB_LENGTH {
            return Err(PreferenceError::Invalid(format!(
                "Dream job cannot exceed {MAX_DREAM_JOB_LENGTH} characters."
            )));
        }
        if self
            .favorite_subjects
            .iter()
            .any(|s| s.chars().count() > MAX_SUBJECT_LENGTH)
        {
            return Err(PreferenceError::Invalid(format!(
                "Each subject cannot exceed {MAX_SUBJECT_LENGTH} characters and must be a string."
            )));
        }
        Ok(())
    }
}

/// One row of the teacher dashboard
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub user_id: i64,
    pub username: String,
    pub favorite_subjects: Vec<String>,
    pub dreams: Option<String>,
    pub dream_job: Option<String>,
    pub preferences_created_at: Option<String>,
    pub preferences_updated_at: Option<String>,
}
