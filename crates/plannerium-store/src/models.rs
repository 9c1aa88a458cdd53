use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use plannerium_core::model::Plan;
pub use plannerium_core::stats::TimeTracking;

use crate::StoreError;

/// Longest accepted project name, in characters.
pub const MAX_NAME_LEN: usize = 128;

/// A plan persisted under a caller-chosen name, with its tracking state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedProject {
    pub project_name: String,
    pub saved_at: DateTime<Utc>,
    pub plan: Plan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_tracking: Option<TimeTracking>,
}

impl SavedProject {
    pub fn new(project_name: impl Into<String>, plan: Plan) -> Self {
        Self {
            project_name: project_name.into(),
            saved_at: Utc::now(),
            plan,
            time_tracking: None,
        }
    }
}

/// A validated project name, safe to use as a file stem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectName(String);

impl ProjectName {
    /// Reject empty names, surrounding whitespace, path separators, leading
    /// dots, control characters and names longer than [`MAX_NAME_LEN`].
    pub fn parse(name: &str) -> Result<Self, StoreError> {
        let reason = if name.trim().is_empty() {
            Some("name is empty")
        } else if name.trim() != name {
            Some("name must not start or end with whitespace")
        } else if name.chars().count() > MAX_NAME_LEN {
            Some("name is too long")
        } else if name.starts_with('.') {
            Some("name must not start with a dot")
        } else if name.contains(['/', '\\']) {
            Some("name must not contain path separators")
        } else if name.chars().any(char::is_control) {
            Some("name must not contain control characters")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(StoreError::InvalidName {
                name: name.to_owned(),
                reason,
            }),
            None => Ok(Self(name.to_owned())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
