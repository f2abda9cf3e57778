//! Task repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use chrono::{DateTime, Utc};
use libsql::{Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{ChangePayload, NewTask, ServerTaskData, SyncConflict, SyncStatus, Task, TaskId, TaskPatch};
use crate::util::{format_timestamp, now_timestamp, parse_timestamp, EPOCH_CURSOR};

const TASK_COLUMNS: &str =
    "id, server_id, title, description, completed, created_at, updated_at, sync_status";

/// Result of attaching a peer-assigned identity to a local row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Identity stored and the row is now `synced`
    Linked,
    /// Identity stored, but the row changed after it was pushed and stays unsynced
    LinkedStillPending,
    /// No local row with that id
    Missing,
    /// The row already carries a different server identity
    Conflict(String),
}

/// libSQL-backed access to the `tasks`, `sync_metadata` and `sync_conflicts` tables
pub struct LibSqlTaskRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlTaskRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a user-created task as `pending` with no server identity
    pub async fn create(&self, task: &NewTask) -> Result<Task> {
        let created_at = format_timestamp(&task.created_at);
        self.conn
            .execute(
                "INSERT INTO tasks (server_id, title, description, completed, created_at, updated_at, sync_status)
                 VALUES (NULL, ?, ?, 0, ?, ?, 'pending')",
                libsql::params![
                    task.title.as_str(),
                    task.description.as_str(),
                    created_at.as_str(),
                    created_at.as_str()
                ],
            )
            .await?;

        let id = TaskId::new(self.conn.last_insert_rowid());
        self.get(id).await?.ok_or(Error::NotFound(id))
    }

    /// Get a task by local id
    pub async fn get(&self, id: TaskId) -> Result<Option<Task>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"),
                libsql::params![id.get()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_task(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a task by the identity the peer assigned to it
    pub async fn get_by_server_id(&self, server_id: &str) -> Result<Option<Task>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE server_id = ?"),
                libsql::params![server_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_task(&row)?)),
            None => Ok(None),
        }
    }

    /// All tasks, newest first
    pub async fn list(&self) -> Result<Vec<Task>> {
        let rows = self
            .conn
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC, id DESC"),
                (),
            )
            .await?;
        collect_tasks(rows).await
    }

    /// Tasks in any of the given states, oldest row first
    pub async fn list_by_status(&self, statuses: &[SyncStatus]) -> Result<Vec<Task>> {
        let Some(first) = statuses.first() else {
            return Ok(Vec::new());
        };

        // Fixed arity keeps the statement static; repeats are harmless in IN
        let mut values = statuses.iter().map(|status| status.as_str()).collect::<Vec<_>>();
        values.resize(3, first.as_str());

        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE sync_status IN (?, ?, ?) ORDER BY id ASC"
                ),
                libsql::params![values[0], values[1], values[2]],
            )
            .await?;
        collect_tasks(rows).await
    }

    /// Apply a user edit and mark the row `pending`
    pub async fn update(&self, id: TaskId, patch: &TaskPatch) -> Result<Task> {
        let updated_at = format_timestamp(&now_timestamp());
        let title = patch.title.clone().map_or(Value::Null, Value::Text);
        let description = patch.description.clone().map_or(Value::Null, Value::Text);
        let completed = patch
            .completed
            .map_or(Value::Null, |completed| Value::Integer(i64::from(completed)));

        let rows = self
            .conn
            .execute(
                "UPDATE tasks
                 SET title = COALESCE(?, title),
                     description = COALESCE(?, description),
                     completed = COALESCE(?, completed),
                     updated_at = ?,
                     sync_status = 'pending'
                 WHERE id = ?",
                libsql::params![title, description, completed, updated_at.as_str(), id.get()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id));
        }

        self.get(id).await?.ok_or(Error::NotFound(id))
    }

    /// Hard delete a task row
    pub async fn delete(&self, id: TaskId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?", libsql::params![id.get()])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id));
        }

        Ok(())
    }

    /// Mark the given rows as failed when they are still pending.
    ///
    /// Rows that are synced again or already failed are left alone.
    pub async fn mark_failed(&self, ids: &[TaskId]) -> Result<u64> {
        let mut changed = 0;
        for id in ids {
            changed += self
                .conn
                .execute(
                    "UPDATE tasks SET sync_status = ? WHERE id = ? AND sync_status = ?",
                    libsql::params![
                        SyncStatus::Error.as_str(),
                        id.get(),
                        SyncStatus::Pending.as_str()
                    ],
                )
                .await?;
        }
        Ok(changed)
    }

    /// Attach the peer identity to a locally created row.
    ///
    /// `pushed` is the content sent in this round; when the row no longer
    /// holds exactly that content it keeps its unsynced status. Timestamps
    /// alone miss edits made within the same millisecond.
    pub async fn link_server_id(
        &self,
        id: TaskId,
        server_id: &str,
        pushed: Option<&ChangePayload>,
    ) -> Result<LinkOutcome> {
        let Some(task) = self.get(id).await? else {
            return Ok(LinkOutcome::Missing);
        };

        if let Some(existing) = task.server_id.as_deref() {
            if existing != server_id {
                return Ok(LinkOutcome::Conflict(existing.to_string()));
            }
        }

        let edited_since_push = pushed.is_some_and(|payload| !payload.matches(&task));
        if edited_since_push {
            self.conn
                .execute(
                    "UPDATE tasks SET server_id = ? WHERE id = ?",
                    libsql::params![server_id, id.get()],
                )
                .await?;
            return Ok(LinkOutcome::LinkedStillPending);
        }

        self.conn
            .execute(
                "UPDATE tasks SET server_id = ?, sync_status = 'synced' WHERE id = ?",
                libsql::params![server_id, id.get()],
            )
            .await?;
        Ok(LinkOutcome::Linked)
    }

    /// Overwrite a row with the peer's state and mark it `synced`.
    /// Peer data skips `NewTask` validation.
    pub async fn overwrite_from_server(&self, id: TaskId, data: &ServerTaskData) -> Result<()> {
        let updated_at = format_timestamp(&data.updated_at);
        self.conn
            .execute(
                "UPDATE tasks
                 SET title = ?, description = ?, completed = ?, updated_at = ?, sync_status = 'synced'
                 WHERE id = ?",
                libsql::params![
                    data.title.as_str(),
                    data.description.as_str(),
                    i32::from(data.completed),
                    updated_at.as_str(),
                    id.get()
                ],
            )
            .await?;
        Ok(())
    }

    /// Insert a task that originated on the peer, unvalidated
    pub async fn insert_from_server(&self, server_id: &str, data: &ServerTaskData) -> Result<Task> {
        let created_at = format_timestamp(&data.created_at);
        let updated_at = format_timestamp(&data.updated_at);
        self.conn
            .execute(
                "INSERT INTO tasks (server_id, title, description, completed, created_at, updated_at, sync_status)
                 VALUES (?, ?, ?, ?, ?, ?, 'synced')",
                libsql::params![
                    server_id,
                    data.title.as_str(),
                    data.description.as_str(),
                    i32::from(data.completed),
                    created_at.as_str(),
                    updated_at.as_str()
                ],
            )
            .await?;

        let id = TaskId::new(self.conn.last_insert_rowid());
        self.get(id).await?.ok_or(Error::NotFound(id))
    }

    /// Delete the row carrying `server_id`; returns whether one existed
    pub async fn delete_by_server_id(&self, server_id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM tasks WHERE server_id = ?",
                libsql::params![server_id],
            )
            .await?;
        Ok(rows > 0)
    }

    /// Log a local edit that a peer change overwrote
    pub async fn record_conflict(
        &self,
        local: &Task,
        server_id: &str,
        incoming_updated_at: &DateTime<Utc>,
    ) -> Result<()> {
        let local_updated_at = format_timestamp(&local.updated_at);
        let incoming_updated_at = format_timestamp(incoming_updated_at);
        let resolved_at = format_timestamp(&now_timestamp());
        self.conn
            .execute(
                "INSERT INTO sync_conflicts (task_id, server_id, local_updated_at, incoming_updated_at, resolved_at, strategy)
                 VALUES (?, ?, ?, ?, ?, 'lww')",
                libsql::params![
                    local.id.get(),
                    server_id,
                    local_updated_at.as_str(),
                    incoming_updated_at.as_str(),
                    resolved_at.as_str()
                ],
            )
            .await?;
        Ok(())
    }

    /// Most recent conflicts first
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, task_id, server_id, local_updated_at, incoming_updated_at, resolved_at, strategy
                 FROM sync_conflicts
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?",
                libsql::params![limit as i64],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            conflicts.push(SyncConflict {
                id: row.get(0)?,
                task_id: TaskId::new(row.get(1)?),
                server_id: row.get(2)?,
                local_updated_at: timestamp_column(&row, 3)?,
                incoming_updated_at: timestamp_column(&row, 4)?,
                resolved_at: timestamp_column(&row, 5)?,
                strategy: row.get(6)?,
            });
        }
        Ok(conflicts)
    }

    /// Cursor of the last successful exchange
    pub async fn load_cursor(&self) -> Result<String> {
        let mut rows = self
            .conn
            .query(
                "SELECT last_sync_timestamp FROM sync_metadata WHERE id = 1",
                (),
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(EPOCH_CURSOR.to_string()),
        }
    }

    /// Persist the cursor returned by the peer
    pub async fn save_cursor(&self, cursor: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_metadata (id, last_sync_timestamp) VALUES (1, ?)
                 ON CONFLICT(id) DO UPDATE SET last_sync_timestamp = excluded.last_sync_timestamp",
                libsql::params![cursor],
            )
            .await?;
        Ok(())
    }

    /// Number of rows per sync status
    pub async fn status_counts(&self) -> Result<Vec<(SyncStatus, usize)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT sync_status, COUNT(*) FROM tasks GROUP BY sync_status ORDER BY sync_status",
                (),
            )
            .await?;

        let mut counts = Vec::new();
        while let Some(row) = rows.next().await? {
            let status = row
                .get::<String>(0)?
                .parse::<SyncStatus>()
                .map_err(Error::Database)?;
            let count = usize::try_from(row.get::<i64>(1)?).unwrap_or_default();
            counts.push((status, count));
        }
        Ok(counts)
    }
}

async fn collect_tasks(mut rows: libsql::Rows) -> Result<Vec<Task>> {
    let mut tasks = Vec::new();
    while let Some(row) = rows.next().await? {
        tasks.push(parse_task(&row)?);
    }
    Ok(tasks)
}

/// Parse a task from a row selected with `TASK_COLUMNS`
fn parse_task(row: &Row) -> Result<Task> {
    let server_id = match row.get_value(1)? {
        Value::Null => None,
        Value::Text(server_id) => Some(server_id),
        other => {
            return Err(Error::Database(format!(
                "unexpected server_id value: {other:?}"
            )))
        }
    };

    Ok(Task {
        id: TaskId::new(row.get(0)?),
        server_id,
        title: row.get(2)?,
        description: row.get(3)?,
        completed: row.get::<i32>(4)? != 0,
        created_at: timestamp_column(row, 5)?,
        updated_at: timestamp_column(row, 6)?,
        sync_status: row
            .get::<String>(7)?
            .parse()
            .map_err(Error::Database)?,
    })
}

fn timestamp_column(row: &Row, idx: i32) -> Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| Error::Database(format!("invalid timestamp '{raw}'")))
}
