use taskline_core::TaskPatch;

use crate::commands::common::{parse_task_id, CliStore};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    patch: TaskPatch,
    store: &CliStore,
) -> Result<(), CliError> {
    let id = parse_task_id(id)?;
    if patch.is_empty() {
        return Err(CliError::NothingToUpdate);
    }

    let updated = store.update(id, patch).await?;
    println!("{}", updated.id);
    Ok(())
}

pub async fn run_toggle(id: &str, store: &CliStore) -> Result<(), CliError> {
    let id = parse_task_id(id)?;

    match store.toggle_completion(id).await? {
        Some(task) => {
            let state = if task.completed { "done" } else { "open" };
            println!("{} {state}", task.id);
        }
        None => println!("No task with ID {id}"),
    }
    Ok(())
}
