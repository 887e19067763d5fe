//! LLM provider endpoints: listing and the runtime key store.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use retrace_ai::{Provider, ProviderKind, create_provider, default_configs};

use crate::api::response::ApiResponse;
use crate::api::state::AppState;

// GET /api/llm/providers
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<Value>> {
    let keys = state.llm_keys.read().await;
    let mut configs = default_configs();

    let mut providers = Vec::new();
    for kind in ProviderKind::all() {
        let has_key = keys
            .get(kind.as_str())
            .map(|key| !key.is_empty())
            .unwrap_or(false);

        let Some(mut config) = configs.remove(&kind) else {
            continue;
        };
        if has_key {
            config.api_key = keys.get(kind.as_str()).cloned().unwrap_or_default();
        }

        let provider = create_provider(config);
        let available = provider.is_available().await;

        providers.push(json!({
            "name": kind.as_str(),
            "display": kind.display_name(),
            "has_key": has_key,
            "available": available,
        }));
    }

    Json(providers)
}

#[derive(Debug, Deserialize)]
pub struct SetKeyRequest {
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
}

// PUT /api/llm/keys
pub async fn set_provider_key(
    State(state): State<AppState>,
    Json(request): Json<SetKeyRequest>,
) -> Json<ApiResponse<()>> {
    let name = ProviderKind::from_name(&request.provider).as_str().to_string();
    let mut keys = state.llm_keys.write().await;
    if request.api_key.is_empty() {
        keys.remove(&name);
    } else {
        keys.insert(name.clone(), request.api_key);
    }
    Json(ApiResponse::message(format!("Key updated for {}", name)))
}
