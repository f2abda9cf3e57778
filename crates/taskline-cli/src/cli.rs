use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use taskline_core::SyncStatus;

#[derive(Parser)]
#[command(name = "taskline")]
#[command(about = "Offline-first task list that syncs when it can")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new task
    #[command(alias = "new")]
    Add {
        /// Task title
        #[arg(required = true)]
        title: Vec<String>,
        /// Task description (read from stdin or $EDITOR when omitted)
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List tasks, newest first
    #[command(alias = "ls")]
    List {
        /// Only show tasks with this sync status
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change fields of an existing task
    Edit {
        /// Local task ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// Set completion explicitly
        #[arg(long, value_name = "BOOL")]
        completed: Option<bool>,
    },
    /// Flip a task between open and done
    Toggle {
        /// Local task ID
        id: String,
    },
    /// Delete a task
    #[command(alias = "rm")]
    Delete {
        /// Local task ID
        id: String,
    },
    /// Sync with the remote task service
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Show sync status of the local store
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep running, syncing whenever the service becomes reachable
    Watch,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// List peer overwrites of unsynced local edits
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusFilter {
    Synced,
    Pending,
    Error,
}

impl From<StatusFilter> for SyncStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Synced => Self::Synced,
            StatusFilter::Pending => Self::Pending,
            StatusFilter::Error => Self::Error,
        }
    }
}
