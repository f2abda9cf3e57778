//! Wire types exchanged with the remote peer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Task, TaskId};

/// Action carried by an outgoing change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
}

/// Action carried by a change coming from the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerAction {
    Create,
    Update,
    Delete,
}

/// Fields pushed for a pending task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePayload {
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

impl ChangePayload {
    /// Whether `task` still holds exactly the content that was pushed
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.title == task.title
            && self.description == task.description
            && self.completed == task.completed
            && self.updated_at == task.updated_at
    }
}

/// One entry of the outgoing changeset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub action: ChangeAction,
    pub data: ChangePayload,
}

impl Change {
    /// Build the change for a pending row.
    ///
    /// `create` iff the row has no server identity yet.
    #[must_use]
    pub fn from_task(task: &Task) -> Self {
        let action = if task.server_id.is_some() {
            ChangeAction::Update
        } else {
            ChangeAction::Create
        };
        Self {
            local_id: Some(task.id),
            server_id: task.server_id.clone(),
            action,
            data: ChangePayload {
                title: task.title.clone(),
                description: task.description.clone(),
                completed: task.completed,
                updated_at: task.updated_at,
            },
        }
    }
}

/// Full task state sent by the peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTaskData {
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One unit of peer state the client must apply locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<TaskId>,
    pub server_id: String,
    pub action: ServerAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ServerTaskData>,
}

/// Body of `POST /tasks/sync`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub last_sync_timestamp: String,
    pub changes: Vec<Change>,
}

/// Successful answer to `POST /tasks/sync`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    /// New cursor; opaque to the client
    pub sync_timestamp: String,
    #[serde(default)]
    pub server_changes: Vec<ServerChange>,
}
