//! Local Ollama backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chat::ChatBackend;
use crate::error::{AiError, Result};
use crate::http_client::build_http_client;
use crate::provider::ProviderConfig;

/// The local HTTP backend; also the fallback for unknown provider names.
pub struct OllamaProvider {
    config: ProviderConfig,
    client: Client,
}

impl OllamaProvider {
    pub fn new(mut config: ProviderConfig) -> Self {
        if config.base_url.is_empty() {
            config.base_url = "http://localhost:11434".to_string();
        }
        if config.model.is_empty() {
            config.model = "codellama:13b".to_string();
        }
        if config.timeout_seconds == 0 {
            config.timeout_seconds = 120;
        }
        if config.temperature == 0.0 {
            config.temperature = 0.1;
        }
        let client = build_http_client(config.timeout_seconds);
        Self { config, client }
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<OllamaMessage<'a>>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "is_zero")]
    num_predict: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    message: OllamaReplyMessage,
    #[serde(default)]
    error: String,
}

#[derive(Deserialize, Default)]
struct OllamaReplyMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl ChatBackend for OllamaProvider {
    fn backend_name(&self) -> &str {
        "ollama"
    }

    async fn ping(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let body = OllamaRequest {
            model: &self.config.model,
            stream: false,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: system,
                },
                OllamaMessage {
                    role: "user",
                    content: user,
                },
            ],
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/chat", self.config.base_url);
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(AiError::Provider(format!(
                "ollama returned status {}: {}",
                status,
                truncate_error(&text)
            )));
        }

        let reply: OllamaResponse = response.json().await?;
        if !reply.error.is_empty() {
            return Err(AiError::Provider(format!("ollama error: {}", reply.error)));
        }

        Ok(reply.message.content)
    }
}

/// Truncate error bodies so large or sensitive responses never propagate.
pub(crate) fn truncate_error(body: &str) -> String {
    const MAX_ERROR_BODY: usize = 512;
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while end > 0 && !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &body[..end])
    } else {
        body.to_string()
    }
}
