use taskline_core::{ClientConfig, SyncEvent};
use tokio::sync::broadcast::error::RecvError;

use crate::commands::common::{format_task_lines, reachability_probe, CliStore};
use crate::error::CliError;

/// Print the task list on every change until interrupted.
pub async fn run_watch(store: &mut CliStore, config: &ClientConfig) -> Result<(), CliError> {
    let probe = match reachability_probe(config)? {
        Some(probe) => Some(probe.spawn(store.connectivity().clone())),
        None => {
            println!("No task service configured; watching local changes only");
            None
        }
    };
    store.start_auto_sync(config.debounce);

    let mut tasks = store.subscribe();
    let mut events = store.subscribe_events();
    print_tasks(&tasks.borrow_and_update());

    loop {
        tokio::select! {
            changed = tasks.changed() => {
                if changed.is_err() {
                    break;
                }
                print_tasks(&tasks.borrow_and_update());
            }
            event = events.recv() => match event {
                Ok(SyncEvent::Completed(report)) => {
                    println!(
                        "-- synced ({}): pushed {}, received {}",
                        report.trigger.as_str(),
                        report.pushed,
                        report.received
                    );
                }
                Ok(SyncEvent::Failed { trigger, message }) => {
                    println!("-- sync failed ({}): {message}", trigger.as_str());
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Missed {skipped} sync event(s)");
                }
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    store.stop_auto_sync();
    if let Some(probe) = probe {
        probe.abort();
    }
    Ok(())
}

fn print_tasks(tasks: &[taskline_core::Task]) {
    println!();
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    for line in format_task_lines(tasks) {
        println!("{line}");
    }
}
