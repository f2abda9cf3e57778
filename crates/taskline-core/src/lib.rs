//! taskline-core - Core library for Taskline
//!
//! This crate contains the task models, the local libSQL store, the sync
//! engine and the connectivity plumbing shared by every Taskline client.
//! Mutations always commit locally first; the sync engine reconciles with a
//! remote peer whenever one is reachable.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

#[cfg(test)]
mod test_support;

pub use config::ClientConfig;
pub use connectivity::Connectivity;
pub use error::{Error, Result};
pub use models::{SyncStatus, Task, TaskId, TaskPatch};
pub use remote::{HttpRemotePeer, RemoteError, RemotePeer};
pub use services::DatabaseService;
pub use state::SyncState;
pub use store::TaskStore;
pub use sync::{SyncEvent, SyncOutcome, SyncSettings, SyncTrigger};
