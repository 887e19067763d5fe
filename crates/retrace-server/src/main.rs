mod api;
mod config;

use std::sync::Arc;

use api::providers::{list_providers, set_provider_key};
use api::runs::{cancel_run, execute_workflow, get_run, list_runs, stream_run};
use api::screenshots::serve_screenshot;
use api::workflows::{
    create_workflow, delete_workflow, generate_workflow, get_workflow, get_workflow_actions,
    list_workflows, regenerate_parameters,
};
use axum::{
    Router,
    http::{Method, header},
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;

use retrace_browser::BrowserConfig;
use retrace_engine::{EngineConfig, WorkflowEngine};
use retrace_storage::Storage;

use crate::api::state::AppState;
use crate::config::ServerConfig;

#[derive(serde::Serialize)]
struct Health {
    status: String,
}

async fn health() -> axum::Json<Health> {
    axum::Json(Health {
        status: "retrace is working!".to_string(),
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,retrace_server=debug".into()),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting retrace server");

    let config = ServerConfig::from_env();

    let storage = Arc::new(
        Storage::new(&config.db_path).expect("Failed to open retrace database"),
    );

    let engine_config = EngineConfig {
        generated_code_root: config.generated_code_root.clone(),
        screenshot_dir: config.screenshot_dir.clone(),
        browser: BrowserConfig {
            headless: config.headless,
            ..BrowserConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = WorkflowEngine::new(engine_config, Some(storage.clone()));

    let state = AppState::new(storage, engine, config.clone());

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = Router::new()
        .route("/health", get(health))
        // Workflow definitions
        .route("/api/workflows", get(list_workflows).post(create_workflow))
        .route(
            "/api/workflows/{id}",
            get(get_workflow).delete(delete_workflow),
        )
        .route("/api/workflows/{id}/actions", get(get_workflow_actions))
        .route("/api/workflows/{id}/generate", post(generate_workflow))
        .route("/api/workflows/{id}/parameters", post(regenerate_parameters))
        // Runs
        .route("/api/workflows/{id}/execute", post(execute_workflow))
        .route("/api/runs", get(list_runs))
        .route("/api/runs/{id}", get(get_run))
        .route("/api/runs/{id}/cancel", post(cancel_run))
        .route("/api/runs/{id}/stream", get(stream_run))
        // LLM providers
        .route("/api/llm/providers", get(list_providers))
        .route("/api/llm/keys", put(set_provider_key))
        // Screenshots
        .route("/api/screenshots/{filename}", get(serve_screenshot))
        .layer(cors)
        .with_state(state);

    let addr = config.bind_addr();
    tracing::info!(addr = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind server address");
    axum::serve(listener, app)
        .await
        .expect("Server error");
}
