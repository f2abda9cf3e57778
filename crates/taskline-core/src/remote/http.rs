//! HTTP client for the task service.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use super::{RemoteError, RemotePeer, RemoteResult};
use crate::models::{SyncRequest, SyncResponse};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Default timeout for a single request to the peer
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HttpRemotePeer {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemotePeer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemotePeer")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpRemotePeer {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            timeout,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(&self, error: reqwest::Error) -> RemoteError {
        if error.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else {
            RemoteError::Http(error)
        }
    }
}

impl RemotePeer for HttpRemotePeer {
    async fn exchange(&self, request: &SyncRequest) -> RemoteResult<SyncResponse> {
        let response = self
            .client
            .post(format!("{}/tasks/sync", self.base_url))
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|error| self.classify(error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| self.classify(error))?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        serde_json::from_str::<SyncResponse>(&body)
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))
    }

    async fn delete_task(&self, server_id: &str) -> RemoteResult<()> {
        let response = self
            .client
            .delete(format!(
                "{}/tasks/{}",
                self.base_url,
                urlencoding::encode(server_id)
            ))
            .send()
            .await
            .map_err(|error| self.classify(error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn api_error(status: StatusCode, body: &str) -> RemoteError {
    RemoteError::Api {
        status: status.as_u16(),
        message: parse_api_error(status, body),
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return message.trim().to_string();
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
    }

    #[test]
    fn normalize_base_url_trims_trailing_slash() {
        let peer = HttpRemotePeer::new("https://api.example.com/ ", DEFAULT_REQUEST_TIMEOUT).unwrap();
        assert_eq!(peer.base_url(), "https://api.example.com");
    }

    #[test]
    fn parse_api_error_prefers_json_message() {
        let message = parse_api_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"Invalid request: bad cursor"}"#,
        );
        assert_eq!(message, "Invalid request: bad cursor");
    }

    #[test]
    fn parse_api_error_falls_back_to_status() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "  "),
            "HTTP 502"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_peer_reports_http_error() {
        // Port 9 (discard) on localhost is closed on any sane test machine
        let peer = HttpRemotePeer::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let request = SyncRequest {
            last_sync_timestamp: crate::util::EPOCH_CURSOR.to_string(),
            changes: Vec::new(),
        };

        let error = peer.exchange(&request).await.unwrap_err();
        assert!(matches!(
            error,
            RemoteError::Http(_) | RemoteError::Timeout(_)
        ));
    }
}
