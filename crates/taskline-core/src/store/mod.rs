//! Task store facade: local-first mutations with opportunistic sync.

mod cache;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;

use crate::connectivity::{spawn_auto_sync, AutoSyncHandle, Connectivity};
use crate::models::{NewTask, SyncConflict, SyncStatus, Task, TaskId, TaskPatch};
use crate::remote::RemotePeer;
use crate::services::DatabaseService;
use crate::state::SyncState;
use crate::sync::{SyncEngine, SyncEvent, SyncOutcome, SyncSettings, SyncTrigger};
use crate::{Error, Result};

pub use cache::TaskCache;

/// Entry point for reading and changing tasks.
///
/// Every mutation commits locally first and never waits for the peer. While
/// online, each mutation also starts a background sync round.
pub struct TaskStore<P> {
    db: DatabaseService,
    cache: TaskCache,
    engine: Arc<SyncEngine<P>>,
    connectivity: Connectivity,
    background: Mutex<JoinSet<()>>,
    auto_sync: Option<AutoSyncHandle>,
}

impl<P: RemotePeer> TaskStore<P> {
    /// Build the store and load the current task list into the cache.
    pub async fn open(
        db: DatabaseService,
        peer: P,
        connectivity: Connectivity,
        settings: SyncSettings,
    ) -> Result<Self> {
        let cache = TaskCache::default();
        cache.refresh(&db).await?;
        let engine = Arc::new(SyncEngine::new(
            db.clone(),
            Arc::new(peer),
            cache.clone(),
            connectivity.clone(),
            settings,
        ));

        Ok(Self {
            db,
            cache,
            engine,
            connectivity,
            background: Mutex::new(JoinSet::new()),
            auto_sync: None,
        })
    }

    /// Sync automatically whenever connectivity settles to online.
    pub fn start_auto_sync(&mut self, debounce: Duration) {
        if self.auto_sync.is_none() {
            self.auto_sync = Some(spawn_auto_sync(
                Arc::clone(&self.engine),
                &self.connectivity,
                debounce,
            ));
        }
    }

    pub fn stop_auto_sync(&mut self) {
        if let Some(handle) = self.auto_sync.take() {
            handle.stop();
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine<P>> {
        &self.engine
    }

    pub const fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub const fn database(&self) -> &DatabaseService {
        &self.db
    }

    pub async fn create(&self, title: &str, description: &str) -> Result<Task> {
        let new_task = NewTask::new(title, description)?;
        let task = self.db.create_task(&new_task).await?;
        tracing::debug!("Created task {}", task.id);
        self.after_mutation().await?;
        Ok(task)
    }

    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task> {
        let patch = patch.normalized()?;
        let task = self.db.update_task(id, &patch).await?;
        tracing::debug!("Updated task {id}");
        self.after_mutation().await?;
        Ok(task)
    }

    /// Flip `completed` based on the cached copy of the task.
    ///
    /// Returns `Ok(None)` when the task is not in the cache.
    pub async fn toggle_completion(&self, id: TaskId) -> Result<Option<Task>> {
        let Some(task) = self.cache.find(id) else {
            tracing::warn!("Cannot toggle task {id}: not in the task list");
            return Ok(None);
        };
        self.update(id, TaskPatch::completed(!task.completed))
            .await
            .map(Some)
    }

    /// Delete a task locally, and on the peer first when it is reachable.
    ///
    /// A failed peer delete is logged and the local delete still happens.
    pub async fn delete(&self, id: TaskId) -> Result<()> {
        let task = self.db.get_task(id).await?.ok_or(Error::NotFound(id))?;

        if let Some(server_id) = task.server_id.as_deref() {
            if self.connectivity.is_online() {
                if let Err(error) = self.engine.peer().delete_task(server_id).await {
                    tracing::warn!("Failed to delete task {id} ({server_id}) on the peer: {error}");
                }
            } else {
                tracing::debug!("Offline; task {id} ({server_id}) is only deleted locally");
            }
        }

        self.db.delete_task(id).await?;
        self.cache.refresh(&self.db).await?;
        Ok(())
    }

    /// Current task list, newest first.
    pub fn list(&self) -> Vec<Task> {
        self.cache.snapshot()
    }

    /// Live task list; the receiver starts with the current list.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.cache.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.engine.subscribe_events()
    }

    pub fn sync_state(&self) -> SyncState {
        self.engine.state()
    }

    /// Run a sync round now. Peer failures are returned as errors.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        self.engine.request_sync(SyncTrigger::Manual).await
    }

    /// Wait for every background sync round started so far.
    pub async fn settle(&self) {
        let mut pending = {
            let mut background = self
                .background
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *background)
        };

        while let Some(result) = pending.join_next().await {
            if let Err(error) = result {
                tracing::warn!("Background sync task ended abnormally: {error}");
            }
        }
    }

    pub async fn cursor(&self) -> Result<String> {
        self.db.load_cursor().await
    }

    pub async fn status_counts(&self) -> Result<Vec<(SyncStatus, usize)>> {
        self.db.status_counts().await
    }

    pub async fn conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        self.db.list_conflicts(limit).await
    }

    async fn after_mutation(&self) -> Result<()> {
        self.cache.refresh(&self.db).await?;
        self.schedule_sync();
        Ok(())
    }

    fn schedule_sync(&self) {
        if !self.connectivity.is_online() {
            return;
        }

        let engine = Arc::clone(&self.engine);
        let mut background = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while background.try_join_next().is_some() {}
        background.spawn(async move {
            match engine.request_sync(SyncTrigger::Mutation).await {
                Ok(outcome) => tracing::debug!(?outcome, "Background sync finished"),
                Err(error) => tracing::warn!("Background sync failed: {error}"),
            }
        });
    }
}
