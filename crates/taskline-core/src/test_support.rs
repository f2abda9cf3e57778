//! Test doubles shared by unit tests across modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::models::{ServerAction, ServerChange, SyncRequest, SyncResponse, TaskId};
use crate::remote::{RemotePeer, RemoteResult};

/// Scripted peer that records every request it receives.
#[derive(Default)]
pub struct StubPeer {
    pub requests: Mutex<Vec<SyncRequest>>,
    pub responses: Mutex<Vec<RemoteResult<SyncResponse>>>,
    pub deletes: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
    /// When set, each exchange waits here until notified
    pub gate: Option<Arc<Notify>>,
}

impl StubPeer {
    pub fn answering(responses: Vec<RemoteResult<SyncResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<SyncRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl RemotePeer for StubPeer {
    async fn exchange(&self, request: &SyncRequest) -> RemoteResult<SyncResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(SyncResponse {
                sync_timestamp: request.last_sync_timestamp.clone(),
                server_changes: Vec::new(),
            })
        } else {
            responses.remove(0)
        }
    }

    async fn delete_task(&self, server_id: &str) -> RemoteResult<()> {
        self.deletes.lock().unwrap().push(server_id.to_string());
        Ok(())
    }
}

pub fn echo(local_id: TaskId, server_id: &str) -> ServerChange {
    ServerChange {
        local_id: Some(local_id),
        server_id: server_id.to_string(),
        action: ServerAction::Create,
        data: None,
    }
}
