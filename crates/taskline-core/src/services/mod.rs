//! Services shared by every Taskline client

mod database;

pub use database::DatabaseService;
