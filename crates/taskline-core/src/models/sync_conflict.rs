//! Sync conflict model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;

/// Local edit overwritten by a peer-originated change (last write wins)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Task whose local edit was discarded
    pub task_id: TaskId,
    /// Server identity of that task
    pub server_id: String,
    /// Timestamp of the discarded local edit
    pub local_updated_at: DateTime<Utc>,
    /// Timestamp carried by the winning peer change
    pub incoming_updated_at: DateTime<Utc>,
    /// When the overwrite was applied
    pub resolved_at: DateTime<Utc>,
    /// Resolution strategy name
    pub strategy: String,
}
