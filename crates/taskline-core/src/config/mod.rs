//! Client configuration shared by every Taskline front end.
//!
//! Values come from a lookup function so that tests can feed a map while
//! binaries read the process environment.

use std::collections::HashMap;
use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;

use thiserror::Error;

use crate::sync::SyncSettings;
use crate::util::{is_http_url, normalize_text_option};

pub const API_URL_VAR: &str = "TASKLINE_API_URL";
pub const REQUEST_TIMEOUT_VAR: &str = "TASKLINE_REQUEST_TIMEOUT_SECS";
pub const DEBOUNCE_VAR: &str = "TASKLINE_DEBOUNCE_MS";
pub const RETRY_FAILED_VAR: &str = "TASKLINE_RETRY_FAILED";
pub const PROBE_INTERVAL_VAR: &str = "TASKLINE_PROBE_INTERVAL_SECS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime settings for a sync client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the remote peer; `None` runs the client local-only
    pub api_url: Option<String>,
    pub request_timeout: Duration,
    /// How long connectivity must stay unchanged before it counts
    pub debounce: Duration,
    pub probe_interval: Duration,
    pub sync: SyncSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            request_timeout: Duration::from_secs(10),
            debounce: Duration::from_millis(500),
            probe_interval: Duration::from_secs(15),
            sync: SyncSettings::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = normalize_text_option(lookup(API_URL_VAR))
            .map(|url| url.trim_end_matches('/').to_string());
        if let Some(url) = api_url.as_deref() {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(format!(
                    "{API_URL_VAR} must start with http:// or https://"
                )));
            }
        }

        let timeout_secs = ranged_u64(&lookup, REQUEST_TIMEOUT_VAR, 10, 1..=120)?;
        let debounce_ms = ranged_u64(&lookup, DEBOUNCE_VAR, 500, 0..=60_000)?;
        let probe_secs = ranged_u64(&lookup, PROBE_INTERVAL_VAR, 15, 1..=3_600)?;
        let retry_failed = match normalize_text_option(lookup(RETRY_FAILED_VAR)) {
            None => true,
            Some(value) => parse_bool(&value).ok_or_else(|| {
                ConfigError::Invalid(format!("{RETRY_FAILED_VAR} must be true or false"))
            })?,
        };

        Ok(Self {
            api_url,
            request_timeout: Duration::from_secs(timeout_secs),
            debounce: Duration::from_millis(debounce_ms),
            probe_interval: Duration::from_secs(probe_secs),
            sync: SyncSettings { retry_failed },
        })
    }
}

fn ranged_u64(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let Some(raw) = normalize_text_option(lookup(name)) else {
        return Ok(default);
    };
    let invalid = || {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    };
    let value = raw.parse::<u64>().map_err(|_| invalid())?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(invalid())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
