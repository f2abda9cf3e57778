//! Local store for Taskline

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{LibSqlTaskRepository, LinkOutcome};
