//! Google Gemini backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chat::ChatBackend;
use crate::error::{AiError, Result};
use crate::http_client::build_http_client;
use crate::ollama::truncate_error;
use crate::provider::ProviderConfig;

pub struct GeminiProvider {
    config: ProviderConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(mut config: ProviderConfig) -> Self {
        if config.base_url.is_empty() {
            config.base_url = "https://generativelanguage.googleapis.com".to_string();
        }
        if config.model.is_empty() {
            config.model = "gemini-1.5-pro".to_string();
        }
        if config.timeout_seconds == 0 {
            config.timeout_seconds = 60;
        }
        let client = build_http_client(config.timeout_seconds);
        Self { config, client }
    }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiReplyContent,
}

#[derive(Deserialize)]
struct GeminiReplyContent {
    #[serde(default)]
    parts: Vec<GeminiReplyPart>,
}

#[derive(Deserialize)]
struct GeminiReplyPart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl ChatBackend for GeminiProvider {
    fn backend_name(&self) -> &str {
        "gemini"
    }

    async fn ping(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let body = GeminiRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart { text: system }],
            },
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: user }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: if self.config.max_tokens == 0 {
                    4096
                } else {
                    self.config.max_tokens
                },
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.config.api_key
        );
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(AiError::Provider(format!(
                "gemini returned status {}: {}",
                status,
                truncate_error(&text)
            )));
        }

        let reply: GeminiResponse = response.json().await?;
        reply
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| AiError::InvalidFormat("gemini reply had no candidates".to_string()))
    }
}
