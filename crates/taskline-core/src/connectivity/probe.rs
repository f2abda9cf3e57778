//! Periodic TCP reachability check feeding the connectivity signal.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use url::Url;

use super::Connectivity;
use crate::remote::{RemoteError, RemoteResult};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Considers the peer reachable when a TCP connection to its host succeeds.
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    address: String,
    interval: Duration,
    connect_timeout: Duration,
}

impl ReachabilityProbe {
    /// Build a probe for the host and port of `base_url`.
    pub fn for_base_url(base_url: &str, interval: Duration) -> RemoteResult<Self> {
        let url = Url::parse(base_url)
            .map_err(|error| RemoteError::InvalidConfiguration(format!("{base_url}: {error}")))?;
        let host = url.host_str().ok_or_else(|| {
            RemoteError::InvalidConfiguration(format!("{base_url}: URL has no host"))
        })?;
        let port = url.port_or_known_default().ok_or_else(|| {
            RemoteError::InvalidConfiguration(format!("{base_url}: URL has no port"))
        })?;

        // IPv6 literals keep their brackets in host_str
        Ok(Self {
            address: format!("{host}:{port}"),
            interval,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// One reachability reading.
    pub async fn check(&self) -> bool {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_)) => true,
            Ok(Err(error)) => {
                tracing::debug!("Peer {} unreachable: {error}", self.address);
                false
            }
            Err(_) => {
                tracing::debug!("Peer {} did not answer within {:?}", self.address, self.connect_timeout);
                false
            }
        }
    }

    /// Publish a reading into `connectivity` every interval until aborted.
    pub fn spawn(self, connectivity: Connectivity) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                connectivity.set_online(self.check().await);
                tokio::time::sleep(self.interval).await;
            }
        })
    }
}
