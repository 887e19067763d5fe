//! Provider trait, configuration, and factory

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use retrace_core::{SemanticAction, WorkflowParameter};

use crate::error::Result;
use crate::{AnthropicProvider, GeminiProvider, OllamaProvider, OpenAiProvider};

/// Context about the live page handed to code generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContext {
    pub url: String,
    pub title: String,
}

/// The uniform capability set every backend implements.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name, as used for selection.
    fn name(&self) -> &str;

    /// Whether the backend is configured and reachable.
    async fn is_available(&self) -> bool;

    /// Generate driver code for a single semantic action.
    async fn generate_action_code(
        &self,
        action: &SemanticAction,
        page: &PageContext,
        retry_count: u32,
        last_error: &str,
    ) -> Result<String>;

    /// Identify variable vs fixed tokens across the action sequence.
    async fn identify_variable_tokens(
        &self,
        actions: &[SemanticAction],
    ) -> Result<Vec<WorkflowParameter>>;

    /// Generate one complete workflow function over all actions.
    async fn generate_complete_workflow(
        &self,
        actions: &[SemanticAction],
        parameters: &[WorkflowParameter],
    ) -> Result<String>;

    /// Classify a value into a short semantic category. Errors degrade to
    /// the neutral category "input".
    async fn classify_value(&self, value: &str) -> Result<String>;
}

/// Supported provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Resolve a provider by name. Unknown names degrade to the local one.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "openai" => Self::OpenAi,
            "anthropic" => Self::Anthropic,
            "gemini" => Self::Gemini,
            _ => Self::Ollama,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ollama => "Ollama (local)",
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Gemini => "Google Gemini",
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::Ollama, Self::OpenAi, Self::Anthropic, Self::Gemini]
    }
}

/// Configuration for one provider backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: u32,
    #[serde(default)]
    pub timeout_seconds: u64,
}

/// Default configurations for each backend.
pub fn default_configs() -> HashMap<ProviderKind, ProviderConfig> {
    let mut configs = HashMap::new();
    configs.insert(
        ProviderKind::Ollama,
        ProviderConfig {
            provider: "ollama".to_string(),
            model: "codellama:13b".to_string(),
            api_key: String::new(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            timeout_seconds: 120,
        },
    );
    configs.insert(
        ProviderKind::OpenAi,
        ProviderConfig {
            provider: "openai".to_string(),
            model: "gpt-4-turbo-preview".to_string(),
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            timeout_seconds: 60,
        },
    );
    configs.insert(
        ProviderKind::Anthropic,
        ProviderConfig {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: String::new(),
            base_url: "https://api.anthropic.com".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            timeout_seconds: 60,
        },
    );
    configs.insert(
        ProviderKind::Gemini,
        ProviderConfig {
            provider: "gemini".to_string(),
            model: "gemini-1.5-pro".to_string(),
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            timeout_seconds: 60,
        },
    );
    configs
}

/// Build a provider from configuration. Unknown provider names fall back to
/// the local backend.
pub fn create_provider(config: ProviderConfig) -> Arc<dyn Provider> {
    match ProviderKind::from_name(&config.provider) {
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(config)),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config)),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config)),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(config)),
    }
}

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[\d\s().-]{7,}$").expect("phone regex"));
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("numeric regex"));

/// Hard-coded categories for obviously-shaped values; checked before any
/// remote classification call.
pub fn classify_shortcut(value: &str) -> Option<&'static str> {
    if value.chars().count() < 2 {
        return Some("input");
    }
    if value.contains('@') && value.contains('.') {
        return Some("email");
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some("url");
    }
    if NUMERIC_RE.is_match(value) {
        return Some("number");
    }
    if PHONE_RE.is_match(value) && value.chars().filter(char::is_ascii_digit).count() >= 7 {
        return Some("phone");
    }
    None
}

/// Normalize a raw classifier reply into a single category token.
pub(crate) fn clean_category(raw: &str) -> String {
    let cleaned = raw.trim().trim_matches(['"', '\'', '`']);
    let first_line = cleaned.lines().next().unwrap_or("");
    let first_word = first_line.split_whitespace().next().unwrap_or("");
    if first_word.is_empty() {
        "input".to_string()
    } else {
        first_word.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_name_degrades_to_local() {
        assert_eq!(ProviderKind::from_name("openai"), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::from_name("Anthropic"), ProviderKind::Anthropic);
        assert_eq!(ProviderKind::from_name("mystery"), ProviderKind::Ollama);
        assert_eq!(ProviderKind::from_name(""), ProviderKind::Ollama);
    }

    #[test]
    fn classify_shortcuts_cover_obvious_shapes() {
        assert_eq!(classify_shortcut("a"), Some("input"));
        assert_eq!(classify_shortcut("user@example.com"), Some("email"));
        assert_eq!(classify_shortcut("https://x.test/page"), Some("url"));
        assert_eq!(classify_shortcut("123456"), Some("number"));
        assert_eq!(classify_shortcut("+1 (555) 123-4567"), Some("phone"));
        assert_eq!(classify_shortcut("cats and dogs"), None);
    }

    #[test]
    fn category_cleanup_takes_first_word() {
        assert_eq!(clean_category("  \"searchQuery\"  "), "searchQuery");
        assert_eq!(clean_category("email address\nmore text"), "email");
        assert_eq!(clean_category(""), "input");
    }
}
