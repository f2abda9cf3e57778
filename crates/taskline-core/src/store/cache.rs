//! Observable in-memory copy of the task list.

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::{Task, TaskId};
use crate::services::DatabaseService;
use crate::Result;

/// Latest full task list, newest first.
///
/// Subscribers see every reload.
#[derive(Clone)]
pub struct TaskCache {
    tx: Arc<watch::Sender<Vec<Task>>>,
}

impl Default for TaskCache {
    fn default() -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self { tx: Arc::new(tx) }
    }
}

impl TaskCache {
    pub fn snapshot(&self) -> Vec<Task> {
        self.tx.borrow().clone()
    }

    pub fn find(&self, id: TaskId) -> Option<Task> {
        self.tx.borrow().iter().find(|task| task.id == id).cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.tx.subscribe()
    }

    /// Reload the whole list from the local store.
    ///
    /// Publishing happens under the database lock, so a slower refresh can
    /// never replace a list read after a later write.
    pub async fn refresh(&self, db: &DatabaseService) -> Result<()> {
        db.publish_tasks(|tasks| {
            self.tx.send_replace(tasks);
        })
        .await
    }
}
