//! Sync rounds: push the local changeset, apply the peer's answer, advance the cursor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use super::ApplyReport;
use crate::connectivity::Connectivity;
use crate::models::{Change, ChangePayload, SyncRequest, SyncStatus, TaskId};
use crate::remote::{RemoteError, RemotePeer};
use crate::services::DatabaseService;
use crate::state::SyncState;
use crate::store::TaskCache;
use crate::{Error, Result};

const EVENT_CAPACITY: usize = 64;

/// Why a round was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Explicit user request; failures are returned to the caller
    Manual,
    /// Connectivity settled to online
    Connectivity,
    /// A local mutation happened while online
    Mutation,
}

impl SyncTrigger {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Connectivity => "connectivity",
            Self::Mutation => "mutation",
        }
    }
}

/// Why a round did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySyncing,
    Offline,
}

/// Successful round summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub trigger: SyncTrigger,
    /// Size of the changeset sent to the peer
    pub pushed: usize,
    /// Number of changes the peer returned
    pub received: usize,
    pub applied: ApplyReport,
    /// Cursor stored at the end of the round
    pub cursor: String,
}

/// Result of a sync request that did not raise an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped(SkipReason),
    /// The peer exchange failed; unsynced rows of the round are now `error`
    Failed { trigger: SyncTrigger, message: String },
}

/// Notification broadcast after every round that reached the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Completed(SyncReport),
    Failed { trigger: SyncTrigger, message: String },
}

/// Engine policy knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Include rows whose last round failed in the next changeset
    pub retry_failed: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self { retry_failed: true }
    }
}

impl SyncSettings {
    fn outgoing_statuses(self) -> &'static [SyncStatus] {
        if self.retry_failed {
            &[SyncStatus::Pending, SyncStatus::Error]
        } else {
            &[SyncStatus::Pending]
        }
    }
}

/// Clears the in-flight latch when the round ends, even on early return.
struct RoundGuard<'a> {
    in_flight: &'a AtomicBool,
}

impl<'a> RoundGuard<'a> {
    fn acquire(in_flight: &'a AtomicBool) -> Option<Self> {
        in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { in_flight })
    }
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

enum RoundResult {
    Completed(SyncReport),
    RemoteFailed(RemoteError),
}

/// Runs sync rounds against one remote peer.
///
/// At most one round is in flight per engine; concurrent requests are
/// skipped rather than queued.
pub struct SyncEngine<P> {
    db: DatabaseService,
    peer: Arc<P>,
    cache: TaskCache,
    connectivity: Connectivity,
    settings: SyncSettings,
    in_flight: AtomicBool,
    state: watch::Sender<SyncState>,
    events: broadcast::Sender<SyncEvent>,
}

impl<P: RemotePeer> SyncEngine<P> {
    pub fn new(
        db: DatabaseService,
        peer: Arc<P>,
        cache: TaskCache,
        connectivity: Connectivity,
        settings: SyncSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            db,
            peer,
            cache,
            connectivity,
            settings,
            in_flight: AtomicBool::new(false),
            state,
            events,
        }
    }

    pub fn peer(&self) -> &P {
        &self.peer
    }

    pub const fn settings(&self) -> SyncSettings {
        self.settings
    }

    /// Whether a round is currently in flight
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Record that connectivity settled to offline.
    pub fn mark_offline(&self) {
        if !self.is_syncing() {
            self.state.send_replace(SyncState::Offline);
        }
    }

    /// Run one sync round unless offline or another round is in flight.
    ///
    /// Local store failures are always returned as errors. A failed peer
    /// exchange is returned as an error only for [`SyncTrigger::Manual`];
    /// other triggers get [`SyncOutcome::Failed`].
    pub async fn request_sync(&self, trigger: SyncTrigger) -> Result<SyncOutcome> {
        if !self.connectivity.is_online() {
            tracing::debug!(trigger = trigger.as_str(), "Sync skipped while offline");
            self.mark_offline();
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }

        let Some(_round) = RoundGuard::acquire(&self.in_flight) else {
            tracing::debug!(
                trigger = trigger.as_str(),
                "Sync skipped; another round is in flight"
            );
            return Ok(SyncOutcome::Skipped(SkipReason::AlreadySyncing));
        };

        self.state.send_replace(SyncState::Syncing);
        let result = self.run_round(trigger).await;

        match result {
            Ok(RoundResult::Completed(report)) => {
                tracing::info!(
                    trigger = trigger.as_str(),
                    pushed = report.pushed,
                    received = report.received,
                    applied = report.applied.applied(),
                    conflicts = report.applied.conflicts,
                    "Sync round completed"
                );
                self.state.send_replace(SyncState::Synced);
                let _ = self.events.send(SyncEvent::Completed(report.clone()));
                Ok(SyncOutcome::Completed(report))
            }
            Ok(RoundResult::RemoteFailed(error)) => {
                let message = error.to_string();
                tracing::warn!(trigger = trigger.as_str(), "Sync round failed: {message}");
                self.state.send_replace(SyncState::Error);
                let _ = self.events.send(SyncEvent::Failed {
                    trigger,
                    message: message.clone(),
                });
                if trigger == SyncTrigger::Manual {
                    Err(Error::Remote(error))
                } else {
                    Ok(SyncOutcome::Failed { trigger, message })
                }
            }
            Err(error) => {
                tracing::error!(trigger = trigger.as_str(), "Sync round aborted: {error}");
                self.state.send_replace(SyncState::Error);
                Err(error)
            }
        }
    }

    async fn run_round(&self, trigger: SyncTrigger) -> Result<RoundResult> {
        let cursor = self.db.load_cursor().await?;
        let outgoing = self
            .db
            .tasks_with_status(self.settings.outgoing_statuses())
            .await?;

        let changes = outgoing.iter().map(Change::from_task).collect::<Vec<_>>();
        let pushed = changes
            .iter()
            .filter_map(|change| change.local_id.map(|id| (id, change.data.clone())))
            .collect::<HashMap<TaskId, ChangePayload>>();
        let request = SyncRequest {
            last_sync_timestamp: cursor,
            changes,
        };

        tracing::debug!(
            trigger = trigger.as_str(),
            changes = request.changes.len(),
            cursor = %request.last_sync_timestamp,
            "Exchanging changes with peer"
        );

        match self.peer.exchange(&request).await {
            Ok(response) => {
                let applied = self
                    .db
                    .commit_round(&response.server_changes, &pushed, &response.sync_timestamp)
                    .await?;
                self.cache.refresh(&self.db).await?;
                Ok(RoundResult::Completed(SyncReport {
                    trigger,
                    pushed: request.changes.len(),
                    received: response.server_changes.len(),
                    applied,
                    cursor: response.sync_timestamp,
                }))
            }
            Err(error) => {
                let ids = pushed.keys().copied().collect::<Vec<_>>();
                match self.db.mark_failed(&ids).await {
                    Ok(marked) => tracing::debug!("Marked {marked} task(s) as failed"),
                    Err(mark_error) => {
                        tracing::error!("Failed to mark unsynced tasks as failed: {mark_error}");
                    }
                }
                if let Err(refresh_error) = self.cache.refresh(&self.db).await {
                    tracing::error!("Failed to refresh task cache: {refresh_error}");
                }
                Ok(RoundResult::RemoteFailed(error))
            }
        }
    }
}
