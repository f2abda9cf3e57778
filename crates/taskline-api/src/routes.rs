use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use taskline_core::models::{SyncRequest, SyncResponse};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::ledger::TaskLedger;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    ledger: Arc<TaskLedger>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            ledger: Arc::new(TaskLedger::default()),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/tasks/sync", post(sync_tasks))
        .route("/tasks/{server_id}", delete(delete_task))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    tasks: usize,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        tasks: state.ledger.live_count().await,
    })
}

async fn sync_tasks(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    let limit = state.config.max_changes_per_request;
    if request.changes.len() > limit {
        return Err(AppError::bad_request(format!(
            "at most {limit} changes are accepted per exchange"
        )));
    }

    let pushed = request.changes.len();
    let response = state.ledger.exchange(request).await?;
    tracing::info!(
        endpoint = "tasks_sync",
        pushed,
        returned = response.server_changes.len(),
        "Completed sync exchange"
    );
    Ok(Json(response))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.ledger.delete(&server_id).await?;
    tracing::info!(endpoint = "tasks_delete", server_id = %server_id, "Deleted task");
    Ok(StatusCode::NO_CONTENT)
}
