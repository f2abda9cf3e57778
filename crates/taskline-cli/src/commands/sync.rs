use taskline_core::sync::SkipReason;
use taskline_core::{ClientConfig, SyncOutcome};

use crate::commands::common::{
    format_sync_conflict_lines, sync_conflict_to_item, CliStore, SyncConflictItem,
};
use crate::error::CliError;

pub async fn run_sync(store: &CliStore, config: &ClientConfig) -> Result<(), CliError> {
    if config.api_url.is_none() {
        return Err(CliError::SyncNotConfigured);
    }

    match store.sync_now().await? {
        SyncOutcome::Completed(report) => {
            println!(
                "Sync completed: pushed {}, received {}, applied {}",
                report.pushed,
                report.received,
                report.applied.applied()
            );
            if report.applied.conflicts > 0 {
                println!(
                    "{} unsynced local edit(s) were overwritten; see `taskline sync conflicts`",
                    report.applied.conflicts
                );
            }
        }
        SyncOutcome::Skipped(SkipReason::Offline) => {
            println!("Task service unreachable; changes stay local until the next sync");
        }
        SyncOutcome::Skipped(SkipReason::AlreadySyncing) => {
            println!("A sync is already running");
        }
        SyncOutcome::Failed { message, .. } => println!("Sync failed: {message}"),
    }
    Ok(())
}

pub async fn run_sync_conflicts(
    limit: usize,
    as_json: bool,
    store: &CliStore,
) -> Result<(), CliError> {
    let conflicts = store.conflicts(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}
