use std::collections::HashMap;
use std::env;

use thiserror::Error;

pub const BIND_ADDR_VAR: &str = "TASKLINE_API_BIND_ADDR";
pub const MAX_CHANGES_VAR: &str = "TASKLINE_API_MAX_CHANGES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Upper bound on the changes accepted in one exchange
    pub max_changes_per_request: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_changes_per_request: 1_000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let bind_addr = optional_trimmed(&lookup, BIND_ADDR_VAR).unwrap_or(defaults.bind_addr);

        let max_changes_per_request = match optional_trimmed(&lookup, MAX_CHANGES_VAR) {
            None => defaults.max_changes_per_request,
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|value| (1..=100_000).contains(value))
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "{MAX_CHANGES_VAR} must be an integer in [1, 100000]"
                    ))
                })?,
        };

        Ok(Self {
            bind_addr,
            max_changes_per_request,
        })
    }
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
