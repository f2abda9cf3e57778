//! Error types for taskline-core

use thiserror::Error;

use crate::models::TaskId;
use crate::remote::RemoteError;

/// Result type alias using taskline-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in taskline-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error raised by the local store
    #[error("Local store error: {0}")]
    LocalStore(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Task not found in the local store
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote peer could not complete a request
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl Error {
    /// Whether the failure came from the local persistence layer.
    pub const fn is_local_store(&self) -> bool {
        matches!(self, Self::Database(_) | Self::LocalStore(_) | Self::Io(_))
    }
}
