//! Task model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::util::now_timestamp;

/// Local identifier of a task row, assigned by the local store on insert.
///
/// Ids are never reused after a row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    /// Wrap a raw row id
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw row id as stored in the database
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Synchronization state of a single task row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Local row matches what the remote peer acknowledged
    Synced,
    /// Local row changed and must go out with the next changeset
    Pending,
    /// The last round that carried this row failed
    Error,
}

impl SyncStatus {
    /// Column value used by the local store
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synced" => Ok(Self::Synced),
            "pending" => Ok(Self::Pending),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown sync status '{other}'")),
        }
    }
}

/// A task in the local list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Local row id
    #[serde(rename = "localId")]
    pub id: TaskId,
    /// Identity assigned by the remote peer after the first successful sync
    pub server_id: Option<String>,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every local mutation
    pub updated_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

impl Task {
    /// Whether the task has local changes the peer has not acknowledged
    #[must_use]
    pub const fn needs_sync(&self) -> bool {
        !matches!(self.sync_status, SyncStatus::Synced)
    }
}

/// Fields for a new task before the local store assigns its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl NewTask {
    /// Validate and normalize user input for a new task
    pub fn new(title: &str, description: &str) -> crate::Result<Self> {
        Ok(Self {
            title: require_text(title, "title")?,
            description: require_text(description, "description")?,
            created_at: now_timestamp(),
        })
    }
}

/// Partial update applied by [`crate::store::TaskStore::update`].
///
/// Only the fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// Patch that only flips completion
    #[must_use]
    pub const fn completed(completed: bool) -> Self {
        Self {
            title: None,
            description: None,
            completed: Some(completed),
        }
    }

    /// Trim text fields and reject empty ones
    pub fn normalized(self) -> crate::Result<Self> {
        Ok(Self {
            title: self
                .title
                .map(|title| require_text(&title, "title"))
                .transpose()?,
            description: self
                .description
                .map(|description| require_text(&description, "description"))
                .transpose()?,
            completed: self.completed,
        })
    }

    /// True when no field would change
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }
}

fn require_text(value: &str, field: &str) -> crate::Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::Error::InvalidInput(format!(
            "task {field} cannot be empty"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_parse() {
        let id: TaskId = " 42 ".parse().unwrap();
        assert_eq!(id, TaskId::new(42));
        assert!("abc".parse::<TaskId>().is_err());
    }

    #[test]
    fn test_sync_status_round_trips_column_value() {
        for status in [SyncStatus::Synced, SyncStatus::Pending, SyncStatus::Error] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("done".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_new_task_trims_and_rejects_empty() {
        let task = NewTask::new("  Buy milk ", "2%").unwrap();
        assert_eq!(task.title, "Buy milk");

        assert!(matches!(
            NewTask::new("   ", "2%"),
            Err(crate::Error::InvalidInput(_))
        ));
        assert!(NewTask::new("Buy milk", "\n").is_err());
    }

    #[test]
    fn test_patch_normalized() {
        let patch = TaskPatch {
            title: Some(" New title ".to_string()),
            ..TaskPatch::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(patch.title.as_deref(), Some("New title"));
        assert!(patch.description.is_none());

        let empty = TaskPatch {
            description: Some(" ".to_string()),
            ..TaskPatch::default()
        };
        assert!(empty.normalized().is_err());
        assert!(TaskPatch::default().is_empty());
    }

    #[test]
    fn test_task_serializes_with_wire_names() {
        let now = now_timestamp();
        let task = Task {
            id: TaskId::new(1),
            server_id: None,
            title: "Buy milk".to_string(),
            description: "2%".to_string(),
            completed: false,
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Pending,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["localId"], 1);
        assert_eq!(json["syncStatus"], "pending");
        assert!(json["serverId"].is_null());
        assert!(task.needs_sync());
    }
}
