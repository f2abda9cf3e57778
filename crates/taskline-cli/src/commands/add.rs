use crate::commands::common::{resolve_description, CliStore};
use crate::error::CliError;

pub async fn run_add(
    title_parts: &[String],
    description: Option<&str>,
    store: &CliStore,
) -> Result<(), CliError> {
    let title = title_parts.join(" ");
    let description = resolve_description(description)?;

    let task = store.create(&title, &description).await?;

    println!("{}", task.id);
    Ok(())
}
