//! OpenAI chat-completions backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chat::ChatBackend;
use crate::error::{AiError, Result};
use crate::http_client::build_http_client;
use crate::ollama::truncate_error;
use crate::provider::ProviderConfig;

pub struct OpenAiProvider {
    config: ProviderConfig,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(mut config: ProviderConfig) -> Self {
        if config.base_url.is_empty() {
            config.base_url = "https://api.openai.com/v1".to_string();
        }
        if config.model.is_empty() {
            config.model = "gpt-4-turbo-preview".to_string();
        }
        if config.timeout_seconds == 0 {
            config.timeout_seconds = 60;
        }
        let client = build_http_client(config.timeout_seconds);
        Self { config, client }
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiReplyMessage,
}

#[derive(Deserialize)]
struct OpenAiReplyMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl ChatBackend for OpenAiProvider {
    fn backend_name(&self) -> &str {
        "openai"
    }

    async fn ping(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let body = OpenAiRequest {
            model: &self.config.model,
            messages: vec![
                OpenAiMessage {
                    role: "system",
                    content: system,
                },
                OpenAiMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: if self.config.max_tokens == 0 {
                None
            } else {
                Some(self.config.max_tokens)
            },
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(AiError::Provider(format!(
                "openai returned status {}: {}",
                status,
                truncate_error(&text)
            )));
        }

        let reply: OpenAiResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AiError::InvalidFormat("openai reply had no choices".to_string()))
    }
}
