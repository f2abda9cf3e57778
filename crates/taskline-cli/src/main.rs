//! Taskline CLI - offline-first task list from the terminal
//!
//! Every command works against the local store first and syncs with the
//! task service when it is configured and reachable.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use taskline_core::{ClientConfig, TaskPatch};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::add::run_add;
use crate::commands::common::{open_store, resolve_db_path};
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_edit, run_toggle};
use crate::commands::list::run_list;
use crate::commands::status::run_status;
use crate::commands::sync::{run_sync, run_sync_conflicts};
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskline=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;
    let db_path = resolve_db_path(cli.db_path)?;
    let mut store = open_store(&db_path, &config).await?;

    match cli.command {
        Commands::Add { title, description } => {
            run_add(&title, description.as_deref(), &store).await?;
        }
        Commands::List { status, json } => run_list(status.map(Into::into), json, &store)?,
        Commands::Edit {
            id,
            title,
            description,
            completed,
        } => {
            let patch = TaskPatch {
                title,
                description,
                completed,
            };
            run_edit(&id, patch, &store).await?;
        }
        Commands::Toggle { id } => run_toggle(&id, &store).await?,
        Commands::Delete { id } => run_delete(&id, &store).await?,
        Commands::Sync { command: None } => run_sync(&store, &config).await?,
        Commands::Sync {
            command: Some(SyncCommands::Conflicts { limit, json }),
        } => run_sync_conflicts(limit, json, &store).await?,
        Commands::Status { json } => run_status(json, &store, &config, &db_path).await?,
        Commands::Watch => run_watch(&mut store, &config).await?,
    }

    // Background rounds started by mutations finish before the process exits
    store.settle().await;
    Ok(())
}
