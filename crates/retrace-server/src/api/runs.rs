//! Run endpoints: start, list, get, cancel, and the websocket stream.

use std::collections::HashMap;
use std::time::Duration;

use axum::Json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{Value, json};

use retrace_core::{RunStatus, WorkflowInput, WorkflowRun};
use retrace_engine::ParallelInput;

use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::api::workflows::load_definition;

const STREAM_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub llm_provider: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_headless() -> bool {
    true
}

fn default_parallelism() -> u32 {
    1
}

// POST /api/workflows/{id}/execute
pub async fn execute_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let Some(definition) = load_definition(&state, &workflow_id)
        .map_err(|error| (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?
    else {
        return Err((StatusCode::NOT_FOUND, "Workflow not found".to_string()));
    };

    if definition.actions.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "no actions".to_string()));
    }

    let api_key = state.api_key_for(&request.llm_provider).await;

    if request.parallelism > 1 {
        return execute_parallel(&state, &definition.id, definition.actions, request, api_key)
            .await;
    }

    let mut run = WorkflowRun::new(&workflow_id, request.parameters.clone());
    state
        .storage
        .runs
        .put(&run)
        .map_err(|error| (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;

    let input = WorkflowInput {
        workflow_id: workflow_id.clone(),
        run_id: run.id.clone(),
        parameters: request.parameters,
        actions: definition.actions,
        llm_provider: request.llm_provider,
        api_key,
        headless: request.headless,
        timeout_seconds: 300,
        retry_attempts: 3,
    };

    let started = state.engine.start_run(input).await;

    run.engine_workflow_id = started.engine_workflow_id.clone();
    run.engine_run_id = started.engine_run_id.clone();
    run.start();
    if let Err(error) = state.storage.runs.put(&run) {
        tracing::warn!(run_id = %run.id, error = %error, "Failed to persist engine ids");
    }

    Ok(Json(json!({
        "run_id": run.id,
        "engine_workflow_id": started.engine_workflow_id,
        "engine_run_id": started.engine_run_id,
        "status": RunStatus::Running,
    })))
}

async fn execute_parallel(
    state: &AppState,
    workflow_id: &str,
    actions: Vec<retrace_core::SemanticAction>,
    request: ExecuteRequest,
    api_key: String,
) -> Result<Json<Value>, (StatusCode, String)> {
    let mut run_configs = Vec::new();
    let mut run_ids = Vec::new();

    for _ in 0..request.parallelism {
        let run = WorkflowRun::new(workflow_id, request.parameters.clone());
        state
            .storage
            .runs
            .put(&run)
            .map_err(|error| (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;
        run_ids.push(run.id.clone());
        run_configs.push(retrace_core::RunConfig {
            run_id: run.id,
            parameters: request.parameters.clone(),
        });
    }

    let input = ParallelInput {
        workflow_id: workflow_id.to_string(),
        actions,
        run_configs,
        llm_provider: request.llm_provider,
        api_key,
        headless: request.headless,
    };

    let engine = state.engine.clone();
    tokio::spawn(async move {
        let result = engine.run_parallel(input).await;
        tracing::info!(runs = result.results.len(), "Parallel workflow batch finished");
    });

    let first = run_ids.first().cloned().unwrap_or_default();
    Ok(Json(json!({
        "run_id": first,
        "engine_workflow_id": format!("retrace-parallel-{}", first),
        "engine_run_id": retrace_core::new_id(),
        "status": RunStatus::Running,
        "run_ids": run_ids,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    #[serde(default)]
    pub workflow_id: String,
}

// GET /api/runs?workflow_id=
pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<ListRunsQuery>,
) -> Json<ApiResponse<Vec<WorkflowRun>>> {
    if query.workflow_id.is_empty() {
        return Json(ApiResponse::ok(Vec::new()));
    }
    match state.storage.runs.list_for_workflow(&query.workflow_id) {
        Ok(runs) => Json(ApiResponse::ok(runs)),
        Err(error) => Json(ApiResponse::error(error.to_string())),
    }
}

// GET /api/runs/{id}
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<WorkflowRun>>, (StatusCode, String)> {
    let run = state
        .storage
        .runs
        .get(&id)
        .map_err(|error| (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;

    let Some(mut run) = run else {
        return Err((StatusCode::NOT_FOUND, "Run not found".to_string()));
    };

    run.action_results = state.storage.results.list_for_run(&id).unwrap_or_default();
    Ok(Json(ApiResponse::ok(run)))
}

// POST /api/runs/{id}/cancel
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let run = state
        .storage
        .runs
        .get(&id)
        .map_err(|error| (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;
    if run.is_none() {
        return Err((StatusCode::NOT_FOUND, "Run not found".to_string()));
    }

    let signalled = state.engine.cancel(&id).await;
    if !signalled {
        tracing::info!(run_id = %id, "Cancel requested for a run with no live engine state");
    }

    if let Err(error) =
        state
            .storage
            .runs
            .update_status(&id, RunStatus::Canceled, "Cancelled by user")
    {
        tracing::warn!(run_id = %id, error = %error, "Failed to persist canceled status");
    }

    Ok(Json(json!({"status": "canceled"})))
}

// GET /api/runs/{id}/stream
pub async fn stream_run(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_updates(socket, state, id))
}

/// Poll the engine (falling back to the store) at most every 500ms, emit a
/// message only when the status or result count changes, and close on a
/// terminal status.
async fn stream_updates(mut socket: WebSocket, state: AppState, run_id: String) {
    let mut interval = tokio::time::interval(Duration::from_millis(STREAM_POLL_INTERVAL_MS));
    let mut last_status: Option<RunStatus> = None;
    let mut last_count = usize::MAX;

    loop {
        interval.tick().await;

        // The engine's progress query is authoritative while the run lives;
        // afterwards the persisted rows are.
        let (status, action_results) = match state.engine.get_progress(&run_id).await {
            Some(progress) => (progress.status, progress.action_results),
            None => {
                let Ok(Some(run)) = state.storage.runs.get(&run_id) else {
                    continue;
                };
                let results = state.storage.results.list_for_run(&run_id).unwrap_or_default();
                (run.status, results)
            }
        };

        let changed = last_status != Some(status) || last_count != action_results.len();
        if changed {
            let message = json!({
                "type": "run_update",
                "payload": {
                    "run_id": run_id,
                    "status": status,
                    "action_results": action_results,
                },
            });
            if socket
                .send(Message::Text(message.to_string().into()))
                .await
                .is_err()
            {
                return;
            }

            last_status = Some(status);
            last_count = action_results.len();

            if status.is_terminal() {
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::workflows::tests::{seed_definition, test_state};

    fn execute_request() -> ExecuteRequest {
        ExecuteRequest {
            parameters: HashMap::new(),
            llm_provider: String::new(),
            headless: true,
            parallelism: 1,
        }
    }

    #[tokio::test]
    async fn execute_refuses_workflows_without_actions() {
        let (state, _tmp) = test_state();
        seed_definition(&state, "wf-empty", false);

        let error = execute_workflow(
            State(state),
            Path("wf-empty".to_string()),
            Json(execute_request()),
        )
        .await
        .unwrap_err();

        assert_eq!(error.0, StatusCode::BAD_REQUEST);
        assert_eq!(error.1, "no actions");
    }

    #[tokio::test]
    async fn execute_unknown_workflow_is_not_found() {
        let (state, _tmp) = test_state();
        let error = execute_workflow(
            State(state),
            Path("missing".to_string()),
            Json(execute_request()),
        )
        .await
        .unwrap_err();
        assert_eq!(error.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_unknown_run_is_not_found() {
        let (state, _tmp) = test_state();
        let error = get_run(State(state), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(error.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_unknown_run_is_not_found() {
        let (state, _tmp) = test_state();
        let error = cancel_run(State(state), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(error.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_marks_the_persisted_run() {
        let (state, _tmp) = test_state();
        seed_definition(&state, "wf-1", true);

        let run = retrace_core::WorkflowRun::new("wf-1", HashMap::new());
        let run_id = run.id.clone();
        state.storage.runs.put(&run).unwrap();

        let response = cancel_run(State(state.clone()), Path(run_id.clone()))
            .await
            .unwrap();
        assert_eq!(response.0["status"], "canceled");

        let stored = state.storage.runs.get(&run_id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Canceled);
        assert!(stored.completed_at.is_some());
    }
}
