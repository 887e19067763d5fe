//! Shared capability wiring over chat-style backends.
//!
//! Every concrete backend only knows how to send a (system, user) prompt pair
//! and report reachability; the full `Provider` capability set is derived
//! from that here, including response post-filtering and the classifier
//! short-circuits.

use async_trait::async_trait;
use serde::Deserialize;

use retrace_core::{ParameterType, SemanticAction, TokenType, WorkflowParameter};

use crate::error::Result;
use crate::prompts;
use crate::provider::{PageContext, Provider, classify_shortcut, clean_category};
use crate::text::{extract_code, extract_json};

/// The minimal surface a chat backend must provide.
#[async_trait]
pub(crate) trait ChatBackend: Send + Sync {
    fn backend_name(&self) -> &str;

    /// Whether the backend is configured and reachable.
    async fn ping(&self) -> bool;

    /// Send one system+user exchange and return the raw reply text.
    async fn chat(&self, system: &str, user: &str) -> Result<String>;
}

/// Parameter shape as produced by the variable-token prompt.
#[derive(Debug, Deserialize)]
struct LlmParameter {
    name: String,
    #[serde(rename = "type", default = "default_parameter_type")]
    parameter_type: ParameterType,
    #[serde(default)]
    default_value: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_required")]
    required: bool,
    #[serde(default)]
    source_action: u32,
}

fn default_parameter_type() -> ParameterType {
    ParameterType::String
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct LlmParameterList {
    #[serde(default)]
    parameters: Vec<LlmParameter>,
}

#[async_trait]
impl<T: ChatBackend> Provider for T {
    fn name(&self) -> &str {
        self.backend_name()
    }

    async fn is_available(&self) -> bool {
        self.ping().await
    }

    async fn generate_action_code(
        &self,
        action: &SemanticAction,
        page: &PageContext,
        retry_count: u32,
        last_error: &str,
    ) -> Result<String> {
        let prompt = prompts::build_action_prompt(action, page, retry_count, last_error);
        let response = self.chat(prompts::SYSTEM_PROMPT, &prompt).await?;
        Ok(extract_code(&response))
    }

    async fn identify_variable_tokens(
        &self,
        actions: &[SemanticAction],
    ) -> Result<Vec<WorkflowParameter>> {
        let prompt = prompts::build_variable_token_prompt(actions);
        let response = self.chat(prompts::JSON_SYSTEM_PROMPT, &prompt).await?;

        let parsed: LlmParameterList = serde_json::from_str(&extract_json(&response))?;
        Ok(parsed
            .parameters
            .into_iter()
            .map(|parameter| WorkflowParameter {
                name: parameter.name,
                parameter_type: parameter.parameter_type,
                default_value: parameter.default_value,
                description: parameter.description,
                required: parameter.required,
                token_type: TokenType::Variable,
                source_action: parameter.source_action,
            })
            .collect())
    }

    async fn generate_complete_workflow(
        &self,
        actions: &[SemanticAction],
        parameters: &[WorkflowParameter],
    ) -> Result<String> {
        let prompt = prompts::build_workflow_prompt(actions, parameters);
        let response = self.chat(prompts::SYSTEM_PROMPT, &prompt).await?;
        Ok(extract_code(&response))
    }

    async fn classify_value(&self, value: &str) -> Result<String> {
        if let Some(category) = classify_shortcut(value) {
            return Ok(category.to_string());
        }

        let prompt = prompts::build_classifier_prompt(value);
        match self.chat(prompts::CLASSIFIER_SYSTEM_PROMPT, &prompt).await {
            Ok(raw) => Ok(clean_category(&raw)),
            Err(error) => {
                tracing::warn!(provider = self.backend_name(), error = %error,
                    "Value classification failed, defaulting to 'input'");
                Ok("input".to_string())
            }
        }
    }
}
