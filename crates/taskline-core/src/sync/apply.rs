//! Applying the peer's changes to the local store.

use std::collections::HashMap;

use crate::db::{LibSqlTaskRepository, LinkOutcome};
use crate::models::{ChangePayload, ServerAction, ServerChange, ServerTaskData, Task, TaskId};
use crate::Result;

/// What one batch of server changes did to the local store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Local rows that received their server id and are now synced
    pub linked: usize,
    /// Local rows that received their server id but were edited mid-round
    pub linked_still_pending: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    /// Unsynced local edits overwritten by the peer
    pub conflicts: usize,
}

impl ApplyReport {
    /// Number of changes that modified the local store
    #[must_use]
    pub const fn applied(&self) -> usize {
        self.linked + self.linked_still_pending + self.inserted + self.updated + self.deleted
    }
}

/// Apply `changes` in order.
///
/// `pushed` maps each row sent in the current round to the content it was
/// sent with. Applying the same list twice leaves the same task rows as
/// applying it once.
pub async fn apply_server_changes(
    repo: &LibSqlTaskRepository<'_>,
    changes: &[ServerChange],
    pushed: &HashMap<TaskId, ChangePayload>,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();

    for change in changes {
        match change.action {
            ServerAction::Create | ServerAction::Update => {
                if let Some(local_id) = change.local_id {
                    link_local_row(repo, local_id, change, pushed, &mut report).await?;
                } else {
                    upsert_server_row(repo, change, &mut report).await?;
                }
            }
            ServerAction::Delete => {
                if repo.delete_by_server_id(&change.server_id).await? {
                    tracing::debug!("Removed task deleted on the peer: {}", change.server_id);
                    report.deleted += 1;
                }
            }
        }
    }

    Ok(report)
}

async fn link_local_row(
    repo: &LibSqlTaskRepository<'_>,
    local_id: TaskId,
    change: &ServerChange,
    pushed: &HashMap<TaskId, ChangePayload>,
    report: &mut ApplyReport,
) -> Result<()> {
    if let Some(owner) = repo.get_by_server_id(&change.server_id).await? {
        if owner.id != local_id {
            tracing::warn!(
                "Ignoring echo for task {local_id}: server id {} already belongs to task {}",
                change.server_id,
                owner.id
            );
            report.skipped += 1;
            return Ok(());
        }
    }

    match repo
        .link_server_id(local_id, &change.server_id, pushed.get(&local_id))
        .await?
    {
        LinkOutcome::Linked => report.linked += 1,
        LinkOutcome::LinkedStillPending => {
            tracing::debug!("Task {local_id} changed during the round; it stays unsynced");
            report.linked_still_pending += 1;
        }
        LinkOutcome::Missing => {
            tracing::debug!("Task {local_id} was deleted locally before its echo arrived");
            report.skipped += 1;
        }
        LinkOutcome::Conflict(existing) => {
            tracing::warn!(
                "Ignoring echo for task {local_id}: it already has server id {existing}, peer sent {}",
                change.server_id
            );
            report.skipped += 1;
        }
    }

    Ok(())
}

/// Peer rows are authoritative and stored as sent, even where local
/// validation would have rejected them.
async fn upsert_server_row(
    repo: &LibSqlTaskRepository<'_>,
    change: &ServerChange,
    report: &mut ApplyReport,
) -> Result<()> {
    let Some(data) = change.data.as_ref() else {
        tracing::warn!(
            "Ignoring {:?} for server id {} without task data",
            change.action,
            change.server_id
        );
        report.skipped += 1;
        return Ok(());
    };
    if data.title.trim().is_empty() || data.description.trim().is_empty() {
        tracing::warn!(
            "Peer sent task {} with a blank title or description",
            change.server_id
        );
    }

    match repo.get_by_server_id(&change.server_id).await? {
        Some(existing) => {
            if existing.needs_sync() && !matches_server_data(&existing, data) {
                tracing::warn!(
                    "Peer overwrote unsynced edits to task {} (local updatedAt {}, peer {})",
                    existing.id,
                    existing.updated_at,
                    data.updated_at
                );
                repo.record_conflict(&existing, &change.server_id, &data.updated_at)
                    .await?;
                report.conflicts += 1;
            }
            repo.overwrite_from_server(existing.id, data).await?;
            report.updated += 1;
        }
        None => {
            let task = repo.insert_from_server(&change.server_id, data).await?;
            tracing::debug!("Inserted task {} from peer ({})", task.id, change.server_id);
            report.inserted += 1;
        }
    }

    Ok(())
}

fn matches_server_data(task: &Task, data: &ServerTaskData) -> bool {
    task.title == data.title
        && task.description == data.description
        && task.completed == data.completed
        && task.updated_at == data.updated_at
}
