//! Shared database service wrapper used by the store facade and the sync engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, LibSqlTaskRepository};
use crate::models::{
    ChangePayload, NewTask, ServerChange, SyncConflict, SyncStatus, Task, TaskId, TaskPatch,
};
use crate::sync::{apply_server_changes, ApplyReport};
use crate::Result;

/// Thread-safe service for DB and repository operations.
///
/// Every call holds the connection lock for its whole duration, so a call is
/// atomic with respect to every other call on the same service.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local task database at {} is unreadable: {}. Moving it aside and starting fresh.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };

        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale sidecar file {}", path.display());
            }
        }

        Ok(())
    }

    /// List all tasks newest-first.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.list().await
    }

    /// List all tasks and hand them to `publish` before the lock is released,
    /// so concurrent readers publish in the order they read.
    pub async fn publish_tasks(&self, publish: impl FnOnce(Vec<Task>)) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        publish(repo.list().await?);
        Ok(())
    }

    /// Fetch a task by local id.
    pub async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.get(id).await
    }

    /// Insert a new pending task.
    pub async fn create_task(&self, task: &NewTask) -> Result<Task> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.create(task).await
    }

    /// Apply a user edit and mark the task pending.
    pub async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.update(id, patch).await
    }

    /// Hard-delete a task row.
    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.delete(id).await
    }

    /// Snapshot of the rows that go into the next changeset.
    pub async fn tasks_with_status(&self, statuses: &[SyncStatus]) -> Result<Vec<Task>> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.list_by_status(statuses).await
    }

    /// Mark the rows of a failed round as errored if they are still pending.
    pub async fn mark_failed(&self, ids: &[TaskId]) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.mark_failed(ids).await
    }

    /// Cursor of the last successful exchange.
    pub async fn load_cursor(&self) -> Result<String> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.load_cursor().await
    }

    /// Apply the peer's changes and advance the cursor in one transaction.
    ///
    /// `pushed` maps every row sent in this round to the content it was
    /// sent with.
    pub async fn commit_round(
        &self,
        changes: &[ServerChange],
        pushed: &HashMap<TaskId, ChangePayload>,
        cursor: &str,
    ) -> Result<ApplyReport> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let repo = LibSqlTaskRepository::new(conn);

        conn.execute("BEGIN TRANSACTION", ()).await?;

        let applied = match apply_server_changes(&repo, changes, pushed).await {
            Ok(report) => repo.save_cursor(cursor).await.map(|()| report),
            Err(error) => Err(error),
        };

        match applied {
            Ok(report) => {
                if let Err(e) = conn.execute("COMMIT", ()).await {
                    conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(report)
            }
            Err(error) => {
                conn.execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }

    /// Row counts per sync status.
    pub async fn status_counts(&self) -> Result<Vec<(SyncStatus, usize)>> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.status_counts().await
    }

    /// List recently recorded last-write-wins overwrites.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.list_conflicts(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Change, ServerAction, ServerTaskData};
    use crate::util::{parse_timestamp, EPOCH_CURSOR};
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_create_and_list_roundtrip() {
        let service = DatabaseService::open_in_memory().await.unwrap();

        service
            .create_task(&NewTask::new("hello", "core").unwrap())
            .await
            .unwrap();
        let tasks = service.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "hello");
        assert!(service.path().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn commit_round_advances_cursor_with_changes() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let changes = vec![ServerChange {
            local_id: None,
            server_id: "srv-1".to_string(),
            action: ServerAction::Create,
            data: Some(ServerTaskData {
                title: "Remote".to_string(),
                description: "desc".to_string(),
                completed: false,
                created_at: parse_timestamp("2024-05-01T10:00:00.000Z").unwrap(),
                updated_at: parse_timestamp("2024-05-01T10:00:00.000Z").unwrap(),
            }),
        }];

        let report = service
            .commit_round(&changes, &HashMap::new(), "T1")
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(service.load_cursor().await.unwrap(), "T1");
        assert_eq!(service.list_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn commit_round_keeps_rows_edited_right_after_the_snapshot_pending() {
        let service = DatabaseService::open_in_memory().await.unwrap();

        for round in 0..50 {
            let task = service
                .create_task(&NewTask::new("draft", "note").unwrap())
                .await
                .unwrap();
            let pushed = service
                .tasks_with_status(&[SyncStatus::Pending])
                .await
                .unwrap()
                .iter()
                .map(|row| (row.id, Change::from_task(row).data))
                .collect::<HashMap<_, _>>();
            let patch = TaskPatch {
                title: Some("edited".to_string()),
                ..TaskPatch::default()
            };
            service.update_task(task.id, &patch).await.unwrap();

            let echo = ServerChange {
                local_id: Some(task.id),
                server_id: format!("srv-{round}"),
                action: ServerAction::Create,
                data: None,
            };
            service
                .commit_round(&[echo], &pushed, "T1")
                .await
                .unwrap();

            let row = service.get_task(task.id).await.unwrap().unwrap();
            assert_eq!(row.title, "edited");
            assert_eq!(row.sync_status, SyncStatus::Pending, "round {round}");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn commit_round_rolls_back_on_local_failure() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let data = ServerTaskData {
            title: "Remote".to_string(),
            description: "desc".to_string(),
            completed: false,
            created_at: parse_timestamp("2024-05-01T10:00:00.000Z").unwrap(),
            updated_at: parse_timestamp("2024-05-01T10:00:00.000Z").unwrap(),
        };
        {
            let db = service.db.lock().await;
            db.connection()
                .execute("DROP TABLE sync_metadata", ())
                .await
                .unwrap();
        }

        let changes = vec![ServerChange {
            local_id: None,
            server_id: "srv-1".to_string(),
            action: ServerAction::Create,
            data: Some(data),
        }];
        let result = service
            .commit_round(&changes, &HashMap::new(), "T1")
            .await;

        assert!(result.is_err_and(|error| error.is_local_store()));
        assert!(service.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_creates_parent_dirs() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("tasks.db");

        let service = DatabaseService::open_path(&path).await.unwrap();
        assert_eq!(service.load_cursor().await.unwrap(), EPOCH_CURSOR);
        assert!(path.exists());
    }

    #[test]
    fn detects_corrupted_db_errors() {
        assert!(DatabaseService::is_corrupted_db_error(
            &crate::Error::Database("SQLite failure: file is not a database".to_string())
        ));
        assert!(!DatabaseService::is_corrupted_db_error(
            &crate::Error::InvalidInput("task title cannot be empty".to_string())
        ));
    }

    #[test]
    fn quarantine_moves_db_and_removes_sidecars() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("tasks.db");
        let wal_path = tmp.path().join("tasks.db-wal");
        let shm_path = tmp.path().join("tasks.db-shm");

        std::fs::write(&db_path, b"bad-db").unwrap();
        std::fs::write(&wal_path, b"wal").unwrap();
        std::fs::write(&shm_path, b"shm").unwrap();

        DatabaseService::quarantine_corrupted_db_files(&db_path).unwrap();

        assert!(!db_path.exists());
        assert!(!wal_path.exists());
        assert!(!shm_path.exists());

        let found_backup = std::fs::read_dir(tmp.path()).unwrap().any(|entry| {
            entry
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("tasks.db.corrupt-")
        });
        assert!(found_backup);
    }
}
