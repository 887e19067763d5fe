//! Shared application state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use retrace_engine::WorkflowEngine;
use retrace_storage::Storage;

use crate::config::ServerConfig;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub engine: WorkflowEngine,
    /// Runtime LLM key store: provider name -> API key. Writes are rare
    /// (UI-initiated); reads occur per run start.
    pub llm_keys: Arc<RwLock<HashMap<String, String>>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(storage: Arc<Storage>, engine: WorkflowEngine, config: ServerConfig) -> Self {
        Self {
            storage,
            engine,
            llm_keys: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
        }
    }

    /// The stored API key for a provider, if any.
    pub async fn api_key_for(&self, provider: &str) -> String {
        let keys = self.llm_keys.read().await;
        keys.get(provider).cloned().unwrap_or_default()
    }
}
