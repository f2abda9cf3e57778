use crate::commands::common::{parse_task_id, CliStore};
use crate::error::CliError;

pub async fn run_delete(id: &str, store: &CliStore) -> Result<(), CliError> {
    let id = parse_task_id(id)?;

    store.delete(id).await?;
    println!("{id}");
    Ok(())
}
