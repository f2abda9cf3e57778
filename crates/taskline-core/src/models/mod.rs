//! Data models for Taskline

mod change;
mod sync_conflict;
mod task;

pub use change::{
    Change, ChangeAction, ChangePayload, ServerAction, ServerChange, ServerTaskData, SyncRequest,
    SyncResponse,
};
pub use sync_conflict::SyncConflict;
pub use task::{NewTask, SyncStatus, Task, TaskId, TaskPatch};
