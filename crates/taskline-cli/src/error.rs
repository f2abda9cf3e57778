use std::io;

use taskline_core::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] taskline_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("No task description provided")]
    EmptyDescription,
    #[error("Invalid task ID: {0}")]
    InvalidTaskId(String),
    #[error("Nothing to change; pass --title, --description or --completed")]
    NothingToUpdate,
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Could not resolve a data directory; pass --db-path or set TASKLINE_DB_PATH")]
    NoDataDir,
    #[error("Sync is not configured. Set TASKLINE_API_URL to the task service base URL.")]
    SyncNotConfigured,
}
