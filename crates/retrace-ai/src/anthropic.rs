//! Anthropic messages backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chat::ChatBackend;
use crate::error::{AiError, Result};
use crate::http_client::build_http_client;
use crate::ollama::truncate_error;
use crate::provider::ProviderConfig;

pub struct AnthropicProvider {
    config: ProviderConfig,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(mut config: ProviderConfig) -> Self {
        if config.base_url.is_empty() {
            config.base_url = "https://api.anthropic.com".to_string();
        }
        if config.model.is_empty() {
            config.model = "claude-sonnet-4-20250514".to_string();
        }
        if config.timeout_seconds == 0 {
            config.timeout_seconds = 60;
        }
        let client = build_http_client(config.timeout_seconds);
        Self { config, client }
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl ChatBackend for AnthropicProvider {
    fn backend_name(&self) -> &str {
        "anthropic"
    }

    async fn ping(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let body = AnthropicRequest {
            model: &self.config.model,
            max_tokens: if self.config.max_tokens == 0 {
                4096
            } else {
                self.config.max_tokens
            },
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: user,
            }],
            temperature: self.config.temperature,
        };

        let url = format!("{}/v1/messages", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(AiError::Provider(format!(
                "anthropic returned status {}: {}",
                status,
                truncate_error(&text)
            )));
        }

        let reply: AnthropicResponse = response.json().await?;
        reply
            .content
            .into_iter()
            .find(|block| block.content_type == "text")
            .map(|block| block.text)
            .ok_or_else(|| AiError::InvalidFormat("anthropic reply had no text block".to_string()))
    }
}
