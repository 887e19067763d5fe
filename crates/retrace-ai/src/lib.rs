//! Retrace AI - multi-provider code-generation abstraction
//!
//! A uniform capability set over several remote code-generation backends:
//! generate driver code for one action, identify variable tokens, synthesize
//! a complete workflow function, and classify value semantics. Selection is
//! by name; unknown names fall back to the local provider. Every caller of
//! code generation is expected to fall back to the deterministic template
//! generator on provider failure.

mod anthropic;
mod chat;
mod error;
mod gemini;
mod http_client;
mod ollama;
mod openai;
pub mod prompts;
pub mod template;
mod text;

pub mod provider;

pub use anthropic::AnthropicProvider;
pub use error::{AiError, Result};
pub use gemini::GeminiProvider;
pub use http_client::build_http_client;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use provider::{
    PageContext, Provider, ProviderConfig, ProviderKind, classify_shortcut, create_provider,
    default_configs,
};
pub use text::{extract_code, extract_json};
