//! Bidirectional sync between the local store and the remote peer.

mod apply;
mod engine;

pub use apply::{apply_server_changes, ApplyReport};
pub use engine::{
    SkipReason, SyncEngine, SyncEvent, SyncOutcome, SyncReport, SyncSettings, SyncTrigger,
};
