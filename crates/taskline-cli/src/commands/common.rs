use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;
use taskline_core::connectivity::ReachabilityProbe;
use taskline_core::models::SyncConflict;
use taskline_core::{
    ClientConfig, Connectivity, DatabaseService, HttpRemotePeer, SyncStatus, Task, TaskId,
    TaskStore,
};

use crate::error::CliError;

pub const DB_PATH_VAR: &str = "TASKLINE_DB_PATH";

/// Store used by every command; `None` peer means local-only
pub type CliStore = TaskStore<Option<HttpRemotePeer>>;

#[derive(Debug, Serialize)]
pub struct TaskListItem {
    pub id: i64,
    pub server_id: Option<String>,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub sync_status: String,
    pub created_at: String,
    pub updated_at: String,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub task_id: i64,
    pub server_id: String,
    pub local_updated_at: String,
    pub incoming_updated_at: String,
    pub resolved_at: String,
    pub strategy: String,
}

/// Open the local store and decide whether the task service is reachable.
pub async fn open_store(db_path: &Path, config: &ClientConfig) -> Result<CliStore, CliError> {
    let db = DatabaseService::open_path(db_path).await?;

    let (peer, online) = match config.api_url.as_deref() {
        Some(url) => {
            let peer =
                HttpRemotePeer::new(url, config.request_timeout).map_err(taskline_core::Error::from)?;
            let online = match reachability_probe(config)? {
                Some(probe) => probe.check().await,
                None => false,
            };
            if !online {
                tracing::info!("Task service at {url} is unreachable; working offline");
            }
            (Some(peer), online)
        }
        None => (None, false),
    };

    Ok(TaskStore::open(db, peer, Connectivity::new(online), config.sync).await?)
}

pub fn reachability_probe(config: &ClientConfig) -> Result<Option<ReachabilityProbe>, CliError> {
    config
        .api_url
        .as_deref()
        .map(|url| ReachabilityProbe::for_base_url(url, config.probe_interval))
        .transpose()
        .map_err(|error| CliError::Core(error.into()))
}

pub fn parse_task_id(id: &str) -> Result<TaskId, CliError> {
    let trimmed = id.trim();
    trimmed
        .parse::<TaskId>()
        .ok()
        .filter(|id| id.get() > 0)
        .ok_or_else(|| CliError::InvalidTaskId(trimmed.to_string()))
}

pub fn filter_tasks(tasks: Vec<Task>, status: Option<SyncStatus>) -> Vec<Task> {
    match status {
        Some(status) => tasks
            .into_iter()
            .filter(|task| task.sync_status == status)
            .collect(),
        None => tasks,
    }
}

pub fn format_task_lines(tasks: &[Task]) -> Vec<String> {
    let now = Utc::now();
    tasks.iter().map(|task| format_task_line(task, now)).collect()
}

pub fn format_task_line(task: &Task, now: DateTime<Utc>) -> String {
    let mark = if task.completed { 'x' } else { ' ' };
    let title = preview(&task.title, 40);
    let relative_time = format_relative_time(task.updated_at, now);
    format!(
        "{:>4}  [{mark}]  {title:<40}  {:<7}  {relative_time}",
        task.id.get(),
        task.sync_status.as_str()
    )
}

pub fn task_to_list_item(task: &Task) -> TaskListItem {
    TaskListItem {
        id: task.id.get(),
        server_id: task.server_id.clone(),
        title: task.title.clone(),
        description: task.description.clone(),
        completed: task.completed,
        sync_status: task.sync_status.to_string(),
        created_at: taskline_core::util::format_timestamp(&task.created_at),
        updated_at: taskline_core::util::format_timestamp(&task.updated_at),
        relative_time: format_relative_time(task.updated_at, Utc::now()),
    }
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        task_id: conflict.task_id.get(),
        server_id: conflict.server_id.clone(),
        local_updated_at: taskline_core::util::format_timestamp(&conflict.local_updated_at),
        incoming_updated_at: taskline_core::util::format_timestamp(&conflict.incoming_updated_at),
        resolved_at: taskline_core::util::format_timestamp(&conflict.resolved_at),
        strategy: conflict.strategy.clone(),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<4}  task={}  server={}  local={} incoming={}",
                format_utc_label(&conflict.resolved_at),
                conflict.strategy,
                conflict.task_id,
                conflict.server_id,
                format_utc_label(&conflict.local_updated_at),
                format_utc_label(&conflict.incoming_updated_at)
            )
        })
        .collect()
}

pub fn format_utc_label(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(timestamp).num_milliseconds().max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Description from the flag, then piped stdin, then `$EDITOR`.
pub fn resolve_description(description: Option<&str>) -> Result<String, CliError> {
    if let Some(description) = description.and_then(normalize_content) {
        return Ok(description);
    }

    if let Some(description) = read_piped_stdin()? {
        return Ok(description);
    }

    if let Some(description) = capture_editor_input()? {
        return Ok(description);
    }

    Err(CliError::EmptyDescription)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_description_path();
    std::fs::write(&temp_file, "")?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_description_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("taskline-task-{}-{now}.md", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(DB_PATH_VAR).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("taskline").join("tasks.db"))
        .ok_or(CliError::NoDataDir)
}
