//! Workflow definition endpoints: upload, CRUD, and code generation.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use retrace_ai::{Provider, create_provider};
use retrace_core::{SemanticAction, WorkflowDefinition, WorkflowParameter, new_id};
use retrace_extract::{
    Extractor, RecordingParser, Tolerance, ValueClassifier, identify_variables,
};

use crate::api::response::ApiResponse;
use crate::api::state::AppState;

/// Adapter from the provider capability set to the extractor's classifier
/// seam. Classification errors degrade to the neutral category.
struct ProviderClassifier(std::sync::Arc<dyn Provider>);

#[async_trait::async_trait]
impl ValueClassifier for ProviderClassifier {
    async fn classify_value(&self, value: &str) -> String {
        self.0
            .classify_value(value)
            .await
            .unwrap_or_else(|_| "input".to_string())
    }
}

// GET /api/workflows
pub async fn list_workflows(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<WorkflowDefinition>>> {
    match state.storage.definitions.list() {
        Ok(definitions) => Json(ApiResponse::ok(definitions)),
        Err(error) => Json(ApiResponse::error(format!(
            "Failed to list workflows: {}",
            error
        ))),
    }
}

// POST /api/workflows  (multipart: events_file, tolerance, name)
pub async fn create_workflow(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<WorkflowDefinition>>, (StatusCode, String)> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name = String::new();
    let mut tolerance = Tolerance::default();
    let mut name = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| (StatusCode::BAD_REQUEST, format!("Failed to parse form: {}", error)))?
    {
        match field.name().unwrap_or_default() {
            "events_file" => {
                file_name = field.file_name().unwrap_or("recording.json").to_string();
                let bytes = field.bytes().await.map_err(|error| {
                    (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", error))
                })?;
                file_bytes = Some(bytes.to_vec());
            }
            "tolerance" => {
                let text = field.text().await.unwrap_or_default();
                tolerance = text.parse().unwrap_or_default();
            }
            "name" => {
                name = field.text().await.unwrap_or_default();
            }
            _ => {}
        }
    }

    let file_bytes = file_bytes
        .ok_or((StatusCode::BAD_REQUEST, "Missing events_file".to_string()))?;

    let mut parser = RecordingParser::new();
    let parse_result = if file_name.to_lowercase().ends_with(".bin") {
        parser.parse_proto(&file_bytes)
    } else {
        parser.parse_json(&file_bytes)
    };
    parse_result.map_err(|error| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to parse events: {}", error),
        )
    })?;

    let mut extractor = Extractor::new(tolerance);
    let mut actions = extractor.extract(parser.events());

    let parameters = {
        let classifier = build_classifier(&state).await;
        identify_variables(&actions, classifier.as_deref()).await
    };

    let mut definition = WorkflowDefinition::new(if name.is_empty() { file_name } else { name });
    definition.start_url = parser.start_url().unwrap_or_default();

    for action in &mut actions {
        action.id = new_id();
        action.workflow_id = definition.id.clone();
    }
    definition.parameters = parameters;

    // Definition row and action rows are stored separately; the response
    // carries both.
    if let Err(error) = state.storage.definitions.put(&definition) {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to create workflow: {}", error),
        ));
    }
    if let Err(error) = state.storage.actions.put_all(&actions) {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to store actions: {}", error),
        ));
    }

    definition.actions = actions;
    Ok(Json(ApiResponse::ok(definition)))
}

async fn build_classifier(state: &AppState) -> Option<Box<dyn ValueClassifier>> {
    // The local provider is preferred for classification; fall back to any
    // backend that has a key configured.
    let keys = state.llm_keys.read().await;
    let mut provider_name = "ollama".to_string();
    if !keys.contains_key("ollama") {
        if let Some((name, _)) = keys.iter().next() {
            provider_name = name.clone();
        }
    }
    let api_key = keys.get(&provider_name).cloned().unwrap_or_default();
    drop(keys);

    let mut configs = retrace_ai::default_configs();
    let kind = retrace_ai::ProviderKind::from_name(&provider_name);
    let mut config = configs.remove(&kind)?;
    config.api_key = api_key;
    Some(Box::new(ProviderClassifier(create_provider(config))))
}

// GET /api/workflows/{id}
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<ApiResponse<WorkflowDefinition>> {
    match load_definition(&state, &id) {
        Ok(Some(definition)) => Json(ApiResponse::ok(definition)),
        Ok(None) => Json(ApiResponse::error("Workflow not found")),
        Err(error) => Json(ApiResponse::error(error.to_string())),
    }
}

// GET /api/workflows/{id}/actions
pub async fn get_workflow_actions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<ApiResponse<Vec<SemanticAction>>> {
    match state.storage.actions.list_for_workflow(&id) {
        Ok(actions) => Json(ApiResponse::ok(actions)),
        Err(error) => Json(ApiResponse::error(error.to_string())),
    }
}

// DELETE /api/workflows/{id}
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<ApiResponse<()>> {
    match state.storage.delete_definition_cascade(&id) {
        Ok(_) => Json(ApiResponse::message(format!("Workflow {} deleted", id))),
        Err(error) => Json(ApiResponse::error(format!(
            "Failed to delete workflow: {}",
            error
        ))),
    }
}

// POST /api/workflows/{id}/parameters
//
// Re-run variable-token identification against the stored action rows and
// replace the definition's parameter list. Same identification path as the
// upload handler.
pub async fn regenerate_parameters(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<WorkflowParameter>>>, (StatusCode, String)> {
    let Some(mut definition) = load_definition(&state, &id)
        .map_err(|error| (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?
    else {
        return Err((StatusCode::NOT_FOUND, "Workflow not found".to_string()));
    };

    let parameters = {
        let classifier = build_classifier(&state).await;
        identify_variables(&definition.actions, classifier.as_deref()).await
    };

    definition.parameters = parameters.clone();
    definition.updated_at = retrace_core::now_ms();

    let mut stored = definition;
    stored.actions.clear();
    state.storage.definitions.put(&stored).map_err(|error| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to persist parameters: {}", error),
        )
    })?;

    Ok(Json(ApiResponse::ok(parameters)))
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub llm_provider: String,
}

// POST /api/workflows/{id}/generate
pub async fn generate_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<GenerateRequest>>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let request = body.map(|Json(request)| request).unwrap_or_default();

    let Some(mut definition) = load_definition(&state, &id)
        .map_err(|error| (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?
    else {
        return Err((StatusCode::NOT_FOUND, "Workflow not found".to_string()));
    };

    let provider_name = if request.llm_provider.is_empty() {
        "ollama".to_string()
    } else {
        request.llm_provider
    };
    let api_key = state.api_key_for(&provider_name).await;

    let kind = retrace_ai::ProviderKind::from_name(&provider_name);
    let mut config = retrace_ai::default_configs()
        .remove(&kind)
        .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "no provider config".to_string()))?;
    config.api_key = api_key;
    let provider = create_provider(config);

    let code = provider
        .generate_complete_workflow(&definition.actions, &definition.parameters)
        .await
        .map_err(|error| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to generate workflow: {}", error),
            )
        })?;

    definition.is_generated = true;
    definition.updated_at = retrace_core::now_ms();
    let mut stored = definition.clone();
    stored.actions.clear();
    if let Err(error) = state.storage.definitions.put(&stored) {
        tracing::warn!(workflow_id = %id, error = %error, "Failed to persist generated flag");
    }

    Ok(Json(json!({
        "workflow_id": id,
        "code": code,
        "generated": true,
    })))
}

/// Load a definition with its action rows attached.
pub(crate) fn load_definition(
    state: &AppState,
    id: &str,
) -> anyhow::Result<Option<WorkflowDefinition>> {
    let Some(mut definition) = state.storage.definitions.get(id)? else {
        return Ok(None);
    };
    definition.actions = state.storage.actions.list_for_workflow(id)?;
    Ok(Some(definition))
}
