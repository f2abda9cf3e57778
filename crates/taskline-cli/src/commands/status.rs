use std::path::Path;

use serde::Serialize;
use taskline_core::{ClientConfig, SyncStatus};

use crate::commands::common::CliStore;
use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub db_path: String,
    pub api_url: Option<String>,
    pub online: bool,
    pub cursor: String,
    pub synced: usize,
    pub pending: usize,
    pub error: usize,
}

impl StatusReport {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Database:  {}", self.db_path),
            format!(
                "Service:   {}",
                self.api_url.as_deref().unwrap_or("not configured (local only)")
            ),
            format!("Online:    {}", if self.online { "yes" } else { "no" }),
            format!("Cursor:    {}", self.cursor),
            format!(
                "Tasks:     {} synced, {} pending, {} error",
                self.synced, self.pending, self.error
            ),
        ]
    }
}

pub async fn collect_status(
    store: &CliStore,
    config: &ClientConfig,
    db_path: &Path,
) -> Result<StatusReport, CliError> {
    let counts = store.status_counts().await?;
    let count_of = |status: SyncStatus| {
        counts
            .iter()
            .find(|(candidate, _)| *candidate == status)
            .map_or(0, |(_, count)| *count)
    };

    Ok(StatusReport {
        db_path: db_path.display().to_string(),
        api_url: config.api_url.clone(),
        online: store.connectivity().is_online(),
        cursor: store.cursor().await?,
        synced: count_of(SyncStatus::Synced),
        pending: count_of(SyncStatus::Pending),
        error: count_of(SyncStatus::Error),
    })
}

pub async fn run_status(
    as_json: bool,
    store: &CliStore,
    config: &ClientConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let report = collect_status(store, config, db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in report.lines() {
            println!("{line}");
        }
    }
    Ok(())
}
