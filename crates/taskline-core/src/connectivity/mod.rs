//! Connectivity signal and the automatic sync it drives.

mod debounce;
mod probe;
mod watcher;

use std::sync::Arc;

use tokio::sync::watch;

pub use debounce::{Debouncer, Transition};
pub use probe::ReachabilityProbe;
pub use watcher::{spawn_auto_sync, AutoSyncHandle};

/// Shared online/offline flag.
///
/// Every `set_online` call is delivered to subscribers, even when the value
/// did not change; consumers debounce and deduplicate.
#[derive(Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for Connectivity {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Connectivity")
            .field("online", &self.is_online())
            .finish()
    }
}

impl Connectivity {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_online(&self, online: bool) {
        self.tx.send_replace(online);
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_values_still_notify_subscribers() {
        let connectivity = Connectivity::new(false);
        let mut rx = connectivity.subscribe();

        connectivity.set_online(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());

        connectivity.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert!(connectivity.is_online());
    }
}
