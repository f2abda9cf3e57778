use taskline_core::SyncStatus;

use crate::commands::common::{
    filter_tasks, format_task_lines, task_to_list_item, CliStore, TaskListItem,
};
use crate::error::CliError;

pub fn run_list(status: Option<SyncStatus>, as_json: bool, store: &CliStore) -> Result<(), CliError> {
    let tasks = filter_tasks(store.list(), status);

    if as_json {
        let json_items = tasks
            .iter()
            .map(task_to_list_item)
            .collect::<Vec<TaskListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if tasks.is_empty() {
        println!("No tasks.");
    } else {
        for line in format_task_lines(&tasks) {
            println!("{line}");
        }
    }

    Ok(())
}
