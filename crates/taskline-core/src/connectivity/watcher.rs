//! Background task that syncs whenever connectivity settles to online.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{Connectivity, Debouncer, Transition};
use crate::remote::RemotePeer;
use crate::sync::{SyncEngine, SyncTrigger};

/// Owns the auto-sync task; the task stops when the handle is dropped.
#[derive(Debug)]
pub struct AutoSyncHandle {
    task: JoinHandle<()>,
}

impl AutoSyncHandle {
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for AutoSyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Watch `connectivity` and request a sync on every settled offline-to-online
/// transition.
///
/// The first settled value counts as a transition, so a client that starts
/// online syncs once at startup.
pub fn spawn_auto_sync<P: RemotePeer>(
    engine: Arc<SyncEngine<P>>,
    connectivity: &Connectivity,
    debounce: Duration,
) -> AutoSyncHandle {
    let mut rx = connectivity.subscribe();
    let task = tokio::spawn(async move {
        let mut debouncer = Debouncer::new(debounce);
        debouncer.observe(*rx.borrow_and_update(), Instant::now());

        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Connectivity source closed; stopping auto sync");
                        break;
                    }
                    let online = *rx.borrow_and_update();
                    debouncer.observe(online, Instant::now());
                }
                () = sleep_until(debouncer.deadline()) => {
                    match debouncer.poll(Instant::now()) {
                        Some(Transition::Online) => {
                            tracing::info!("Connectivity restored; syncing");
                            match engine.request_sync(SyncTrigger::Connectivity).await {
                                Ok(outcome) => tracing::debug!(?outcome, "Connectivity sync finished"),
                                Err(error) => tracing::warn!("Connectivity sync failed: {error}"),
                            }
                        }
                        Some(Transition::Offline) => {
                            tracing::info!("Connectivity lost; changes stay local");
                            engine.mark_offline();
                        }
                        None => {}
                    }
                }
            }
        }
    });

    AutoSyncHandle { task }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
