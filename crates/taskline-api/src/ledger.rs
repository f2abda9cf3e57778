//! Authoritative in-memory task set shared by every client.
//!
//! Each stored task remembers the server clock value of its last change.
//! Clients receive everything changed after the cursor they present,
//! tombstones included, and the cursor handed back is always later than
//! any change already recorded.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};
use taskline_core::models::{
    Change, ServerAction, ServerChange, ServerTaskData, SyncRequest, SyncResponse,
};
use taskline_core::util::{format_timestamp, now_timestamp, parse_timestamp};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Default)]
pub struct TaskLedger {
    state: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    tasks: HashMap<String, StoredTask>,
    clock: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct StoredTask {
    data: ServerTaskData,
    deleted: bool,
    inserted_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl StoredTask {
    fn to_change(&self, server_id: &str, since: DateTime<Utc>) -> ServerChange {
        if self.deleted {
            return ServerChange {
                local_id: None,
                server_id: server_id.to_string(),
                action: ServerAction::Delete,
                data: None,
            };
        }

        let action = if self.inserted_at > since {
            ServerAction::Create
        } else {
            ServerAction::Update
        };
        ServerChange {
            local_id: None,
            server_id: server_id.to_string(),
            action,
            data: Some(self.data.clone()),
        }
    }
}

impl LedgerState {
    /// Strictly increasing millisecond clock
    fn tick(&mut self) -> DateTime<Utc> {
        let now = now_timestamp();
        let next = match self.clock {
            Some(last) if now <= last => last + TimeDelta::milliseconds(1),
            _ => now,
        };
        self.clock = Some(next);
        next
    }

    fn apply_client_change(&mut self, change: Change) -> ServerChange {
        let at = self.tick();
        // A known server id is an upsert whatever the action says
        let server_id = change
            .server_id
            .unwrap_or_else(|| Uuid::now_v7().to_string());

        if let Some(existing) = self.tasks.get_mut(&server_id) {
            if existing.deleted {
                tracing::debug!("Client pushed a change for deleted task {server_id}");
                return ServerChange {
                    local_id: None,
                    server_id,
                    action: ServerAction::Delete,
                    data: None,
                };
            }

            existing.data.title = change.data.title;
            existing.data.description = change.data.description;
            existing.data.completed = change.data.completed;
            existing.data.updated_at = change.data.updated_at;
            existing.modified_at = at;
            return ServerChange {
                local_id: change.local_id,
                server_id,
                action: ServerAction::Update,
                data: None,
            };
        }

        self.tasks.insert(
            server_id.clone(),
            StoredTask {
                data: ServerTaskData {
                    title: change.data.title,
                    description: change.data.description,
                    completed: change.data.completed,
                    created_at: at,
                    updated_at: change.data.updated_at,
                },
                deleted: false,
                inserted_at: at,
                modified_at: at,
            },
        );
        ServerChange {
            local_id: change.local_id,
            server_id,
            action: ServerAction::Create,
            data: None,
        }
    }
}

impl TaskLedger {
    /// Apply a client's changes and answer with echoes plus everything
    /// changed since its cursor.
    pub async fn exchange(&self, request: SyncRequest) -> Result<SyncResponse, AppError> {
        let since = parse_timestamp(&request.last_sync_timestamp).ok_or_else(|| {
            AppError::bad_request(format!(
                "lastSyncTimestamp `{}` is not an RFC 3339 timestamp",
                request.last_sync_timestamp
            ))
        })?;

        let mut state = self.state.lock().await;
        let pushed = request.changes.len();
        let mut server_changes = Vec::with_capacity(pushed);
        let mut echoed = HashSet::with_capacity(pushed);

        for change in request.changes {
            let echo = state.apply_client_change(change);
            echoed.insert(echo.server_id.clone());
            server_changes.push(echo);
        }

        let mut changed: Vec<(&String, &StoredTask)> = state
            .tasks
            .iter()
            .filter(|(server_id, task)| task.modified_at > since && !echoed.contains(*server_id))
            .collect();
        changed.sort_by_key(|(_, task)| task.modified_at);
        server_changes.extend(
            changed
                .into_iter()
                .map(|(server_id, task)| task.to_change(server_id, since)),
        );

        let sync_timestamp = format_timestamp(&state.tick());
        tracing::debug!(
            pushed,
            returned = server_changes.len() - pushed,
            cursor = %sync_timestamp,
            "Handled sync exchange"
        );

        Ok(SyncResponse {
            sync_timestamp,
            server_changes,
        })
    }

    /// Tombstone a live task.
    pub async fn delete(&self, server_id: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let at = state.tick();
        match state.tasks.get_mut(server_id) {
            Some(task) if !task.deleted => {
                task.deleted = true;
                task.modified_at = at;
                Ok(())
            }
            _ => Err(AppError::NotFound(server_id.to_string())),
        }
    }

    /// Number of tasks that are not tombstoned
    pub async fn live_count(&self) -> usize {
        let state = self.state.lock().await;
        state.tasks.values().filter(|task| !task.deleted).count()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use taskline_core::models::{ChangeAction, ChangePayload};
    use taskline_core::util::EPOCH_CURSOR;
    use taskline_core::TaskId;

    use super::*;

    fn create(local_id: i64, title: &str) -> Change {
        Change {
            local_id: Some(TaskId::new(local_id)),
            server_id: None,
            action: ChangeAction::Create,
            data: ChangePayload {
                title: title.to_string(),
                description: "note".to_string(),
                completed: false,
                updated_at: now_timestamp(),
            },
        }
    }

    fn request(cursor: &str, changes: Vec<Change>) -> SyncRequest {
        SyncRequest {
            last_sync_timestamp: cursor.to_string(),
            changes,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_is_echoed_with_local_id_and_new_server_id() {
        let ledger = TaskLedger::default();
        let response = ledger
            .exchange(request(EPOCH_CURSOR, vec![create(1, "Buy milk")]))
            .await
            .unwrap();

        assert_eq!(response.server_changes.len(), 1);
        let echo = &response.server_changes[0];
        assert_eq!(echo.local_id, Some(TaskId::new(1)));
        assert_eq!(echo.action, ServerAction::Create);
        assert!(Uuid::parse_str(&echo.server_id).is_ok());
        assert!(parse_timestamp(&response.sync_timestamp).is_some());
        assert_eq!(ledger.live_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn other_clients_receive_changes_after_their_cursor() {
        let ledger = TaskLedger::default();
        let first = ledger
            .exchange(request(EPOCH_CURSOR, vec![create(1, "Buy milk")]))
            .await
            .unwrap();
        let server_id = first.server_changes[0].server_id.clone();

        let fresh = ledger
            .exchange(request(EPOCH_CURSOR, Vec::new()))
            .await
            .unwrap();
        assert_eq!(fresh.server_changes.len(), 1);
        assert_eq!(fresh.server_changes[0].server_id, server_id);
        assert_eq!(fresh.server_changes[0].local_id, None);
        assert_eq!(fresh.server_changes[0].action, ServerAction::Create);
        assert_eq!(
            fresh.server_changes[0].data.as_ref().map(|data| data.title.as_str()),
            Some("Buy milk")
        );

        let caught_up = ledger
            .exchange(request(&first.sync_timestamp, Vec::new()))
            .await
            .unwrap();
        assert!(caught_up.server_changes.is_empty());
        assert!(caught_up.sync_timestamp > first.sync_timestamp);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_produces_tombstone_and_rejects_unknown_ids() {
        let ledger = TaskLedger::default();
        let first = ledger
            .exchange(request(EPOCH_CURSOR, vec![create(1, "Buy milk")]))
            .await
            .unwrap();
        let server_id = first.server_changes[0].server_id.clone();

        ledger.delete(&server_id).await.unwrap();
        assert_eq!(
            ledger.delete(&server_id).await,
            Err(AppError::NotFound(server_id.clone()))
        );
        assert!(ledger.delete("missing").await.is_err());
        assert_eq!(ledger.live_count().await, 0);

        let next = ledger
            .exchange(request(&first.sync_timestamp, Vec::new()))
            .await
            .unwrap();
        assert_eq!(
            next.server_changes,
            vec![ServerChange {
                local_id: None,
                server_id,
                action: ServerAction::Delete,
                data: None,
            }]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_overwrites_and_update_of_deleted_task_answers_delete() {
        let ledger = TaskLedger::default();
        let first = ledger
            .exchange(request(EPOCH_CURSOR, vec![create(1, "Buy milk")]))
            .await
            .unwrap();
        let server_id = first.server_changes[0].server_id.clone();

        let mut update = create(1, "Buy oat milk");
        update.action = ChangeAction::Update;
        update.server_id = Some(server_id.clone());
        let response = ledger
            .exchange(request(&first.sync_timestamp, vec![update.clone()]))
            .await
            .unwrap();
        assert_eq!(response.server_changes.len(), 1);
        assert_eq!(response.server_changes[0].action, ServerAction::Update);
        assert_eq!(response.server_changes[0].local_id, Some(TaskId::new(1)));

        let fresh = ledger
            .exchange(request(EPOCH_CURSOR, Vec::new()))
            .await
            .unwrap();
        assert_eq!(
            fresh.server_changes[0].data.as_ref().map(|data| data.title.as_str()),
            Some("Buy oat milk")
        );

        ledger.delete(&server_id).await.unwrap();
        let response = ledger
            .exchange(request(&response.sync_timestamp, vec![update]))
            .await
            .unwrap();
        assert_eq!(response.server_changes.len(), 1);
        assert_eq!(response.server_changes[0].action, ServerAction::Delete);
        assert_eq!(response.server_changes[0].server_id, server_id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejects_unparseable_cursor() {
        let ledger = TaskLedger::default();
        let error = ledger
            .exchange(request("yesterday", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::BadRequest(message) if message.contains("yesterday")));
    }
}
