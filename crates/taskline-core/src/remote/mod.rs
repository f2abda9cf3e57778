//! Remote peer: the authoritative task service the engine exchanges changes with.

mod http;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::models::{SyncRequest, SyncResponse};

pub use http::HttpRemotePeer;

/// Failure talking to the remote peer
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Remote request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {message} ({status})")]
    Api { status: u16, message: String },
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("Remote peer unavailable: {0}")]
    Unavailable(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The two operations the client needs from the authoritative service.
pub trait RemotePeer: Send + Sync + 'static {
    /// Push a changeset and receive the peer's changes since the given cursor.
    fn exchange(
        &self,
        request: &SyncRequest,
    ) -> impl Future<Output = RemoteResult<SyncResponse>> + Send;

    /// Delete a server-side task right away.
    fn delete_task(&self, server_id: &str) -> impl Future<Output = RemoteResult<()>> + Send;
}

/// `None` is a client without a configured peer; every call fails.
impl<P: RemotePeer> RemotePeer for Option<P> {
    async fn exchange(&self, request: &SyncRequest) -> RemoteResult<SyncResponse> {
        match self {
            Some(peer) => peer.exchange(request).await,
            None => Err(not_configured()),
        }
    }

    async fn delete_task(&self, server_id: &str) -> RemoteResult<()> {
        match self {
            Some(peer) => peer.delete_task(server_id).await,
            None => Err(not_configured()),
        }
    }
}

fn not_configured() -> RemoteError {
    RemoteError::InvalidConfiguration("no remote peer configured".to_string())
}
