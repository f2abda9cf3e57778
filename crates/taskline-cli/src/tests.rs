use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::Parser;
use taskline_core::models::SyncConflict;
use taskline_core::{ClientConfig, SyncStatus, Task, TaskId, TaskPatch};

use crate::cli::{Cli, Commands, StatusFilter, SyncCommands};
use crate::commands::common::{
    default_editor, filter_tasks, format_relative_time, format_sync_conflict_lines,
    format_task_line, format_utc_label, normalize_content, open_store, parse_task_id, preview,
    resolve_db_path, task_to_list_item, CliStore,
};
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_edit, run_toggle};
use crate::commands::status::collect_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().unwrap()
}

fn task(id: i64, title: &str, status: SyncStatus) -> Task {
    Task {
        id: TaskId::new(id),
        server_id: None,
        title: title.to_string(),
        description: "note".to_string(),
        completed: false,
        created_at: at(1_700_000_000),
        updated_at: at(1_700_000_000),
        sync_status: status,
    }
}

async fn temp_store(dir: &tempfile::TempDir) -> CliStore {
    open_store(&dir.path().join("tasks.db"), &ClientConfig::default())
        .await
        .unwrap()
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
    assert_eq!(
        normalize_content("line 1\nline 2\n"),
        Some("line 1\nline 2".to_string())
    );
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn parse_task_id_accepts_positive_integers() {
    assert_eq!(parse_task_id(" 7 ").unwrap(), TaskId::new(7));
    assert!(matches!(parse_task_id("0"), Err(CliError::InvalidTaskId(_))));
    assert!(matches!(parse_task_id("-3"), Err(CliError::InvalidTaskId(_))));
    assert!(matches!(parse_task_id("abc"), Err(CliError::InvalidTaskId(id)) if id == "abc"));
}

#[test]
fn format_relative_time_units() {
    let now = at(10_000_000);
    assert_eq!(format_relative_time(now - Duration::seconds(30), now), "just now");
    assert_eq!(format_relative_time(now - Duration::minutes(2), now), "2m ago");
    assert_eq!(format_relative_time(now - Duration::hours(2), now), "2h ago");
    assert_eq!(format_relative_time(now - Duration::days(3), now), "3d ago");
    assert_eq!(format_relative_time(now + Duration::minutes(5), now), "just now");
}

#[test]
fn preview_collapses_whitespace_and_truncates() {
    assert_eq!(preview("  Buy   milk \nand eggs", 40), "Buy milk");
    assert_eq!(
        preview("This is a very long sentence that should be shortened", 20),
        "This is a very lo..."
    );
}

#[test]
fn format_task_line_shows_mark_and_status() {
    let mut done = task(12, "Buy milk", SyncStatus::Pending);
    done.completed = true;
    let line = format_task_line(&done, at(1_700_000_000) + Duration::minutes(3));

    assert!(line.starts_with("  12  [x]  Buy milk"));
    assert!(line.contains("pending"));
    assert!(line.ends_with("3m ago"));
}

#[test]
fn task_to_list_item_uses_column_names() {
    let mut synced = task(1, "Buy milk", SyncStatus::Synced);
    synced.server_id = Some("srv-1".to_string());
    let item = task_to_list_item(&synced);

    assert_eq!(item.id, 1);
    assert_eq!(item.server_id.as_deref(), Some("srv-1"));
    assert_eq!(item.sync_status, "synced");
}

#[test]
fn format_utc_label_uses_utc_suffix() {
    assert_eq!(format_utc_label(&at(0)), "1970-01-01 00:00:00 UTC");
}

#[test]
fn format_sync_conflict_lines_include_key_fields() {
    let conflicts = vec![SyncConflict {
        id: 1,
        task_id: TaskId::new(4),
        server_id: "srv-9".to_string(),
        local_updated_at: at(200),
        incoming_updated_at: at(100),
        resolved_at: at(300),
        strategy: "lww".to_string(),
    }];

    let rendered = format_sync_conflict_lines(&conflicts);
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].starts_with("1970-01-01 00:05:00 UTC  lww"));
    assert!(rendered[0].contains("task=4"));
    assert!(rendered[0].contains("server=srv-9"));
    assert!(rendered[0].contains("local=1970-01-01 00:03:20 UTC"));
    assert!(rendered[0].contains("incoming=1970-01-01 00:01:40 UTC"));
}

#[test]
fn filter_tasks_by_status() {
    let tasks = vec![
        task(1, "a", SyncStatus::Synced),
        task(2, "b", SyncStatus::Pending),
        task(3, "c", SyncStatus::Error),
    ];

    let pending = filter_tasks(tasks.clone(), Some(StatusFilter::Pending.into()));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, TaskId::new(2));
    assert_eq!(filter_tasks(tasks, None).len(), 3);
}

#[test]
fn status_filter_maps_to_sync_status() {
    assert_eq!(SyncStatus::from(StatusFilter::Synced), SyncStatus::Synced);
    assert_eq!(SyncStatus::from(StatusFilter::Pending), SyncStatus::Pending);
    assert_eq!(SyncStatus::from(StatusFilter::Error), SyncStatus::Error);
}

#[test]
fn cli_parses_commands() {
    let cli = Cli::try_parse_from(["taskline", "add", "Buy", "milk", "-d", "2 litres"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Add { ref title, description: Some(ref description) }
            if title.join(" ") == "Buy milk" && description == "2 litres"
    ));

    let cli = Cli::try_parse_from(["taskline", "sync", "conflicts", "--limit", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Sync {
            command: Some(SyncCommands::Conflicts { limit: 3, json: false })
        }
    ));

    let cli =
        Cli::try_parse_from(["taskline", "--db-path", "/tmp/x.db", "edit", "4", "--completed", "true"])
            .unwrap();
    assert_eq!(
        cli.db_path.as_deref(),
        Some(std::path::Path::new("/tmp/x.db"))
    );
    assert!(matches!(
        cli.command,
        Commands::Edit { completed: Some(true), .. }
    ));

    assert!(Cli::try_parse_from(["taskline", "add"]).is_err());
}

#[test]
fn resolve_db_path_prefers_flag() {
    let path = std::path::PathBuf::from("/tmp/flag.db");
    assert_eq!(resolve_db_path(Some(path.clone())).unwrap(), path);
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_toggle_and_delete_work_offline() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir).await;
    let created = store.create("Buy milk", "2 litres").await.unwrap();
    let id = created.id.to_string();

    let error = run_edit(&id, TaskPatch::default(), &store).await.unwrap_err();
    assert!(matches!(error, CliError::NothingToUpdate));

    let patch = TaskPatch {
        title: Some("Buy oat milk".to_string()),
        ..TaskPatch::default()
    };
    run_edit(&id, patch, &store).await.unwrap();
    run_toggle(&id, &store).await.unwrap();

    let tasks = store.list();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Buy oat milk");
    assert!(tasks[0].completed);
    assert_eq!(tasks[0].sync_status, SyncStatus::Pending);

    run_delete(&id, &store).await.unwrap();
    assert!(store.list().is_empty());

    let error = run_delete(&id, &store).await.unwrap_err();
    assert!(matches!(
        error,
        CliError::Core(taskline_core::Error::NotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_sync_requires_sync_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let store = temp_store(&dir).await;

    let error = run_sync(&store, &ClientConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::SyncNotConfigured));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_service_keeps_changes_pending() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tasks.db");
    let config = ClientConfig {
        api_url: Some("http://127.0.0.1:9".to_string()),
        ..ClientConfig::default()
    };
    let store = open_store(&db_path, &config).await.unwrap();
    assert!(!store.connectivity().is_online());

    store.create("Buy milk", "2 litres").await.unwrap();
    run_sync(&store, &config).await.unwrap();
    store.settle().await;

    let report = collect_status(&store, &config, &db_path).await.unwrap();
    assert!(!report.online);
    assert_eq!(report.api_url.as_deref(), Some("http://127.0.0.1:9"));
    assert_eq!(report.pending, 1);
    assert_eq!(report.synced, 0);
    assert_eq!(report.error, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn collect_status_reports_local_only_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tasks.db");
    let store = temp_store(&dir).await;
    store.create("One", "note").await.unwrap();
    store.create("Two", "note").await.unwrap();

    let config = ClientConfig::default();
    let report = collect_status(&store, &config, &db_path).await.unwrap();

    assert_eq!(report.api_url, None);
    assert!(!report.online);
    assert_eq!(report.pending, 2);
    assert_eq!(report.db_path, db_path.display().to_string());
    assert!(report.lines()[1].contains("not configured"));
}
