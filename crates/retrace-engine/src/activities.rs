//! Side-effecting activities
//!
//! Everything that touches the filesystem, the network, or the browser lives
//! here; the orchestrator only sequences these through the activity runner.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use retrace_ai::{PageContext, Provider, ProviderConfig, create_provider, default_configs, template};
use retrace_browser::{BrowserConfig, SessionRegistry};
use retrace_core::{ActionResult, ActionType, RunStatus, SemanticAction, now_ms};

use crate::activity::ActivityContext;
use crate::error::ActivityError;

static MUST_ELEMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"MustElement\("([^"]+)"\)"#).expect("MustElement regex"));

/// Resolve the configuration for a named provider, with the run's API key
/// passed through. Unknown names degrade to the local provider.
pub(crate) fn resolve_provider_config(name: &str, api_key: &str) -> ProviderConfig {
    let kind = retrace_ai::ProviderKind::from_name(name);
    let mut configs = default_configs();
    let mut config = configs.remove(&kind).unwrap_or(ProviderConfig {
        provider: kind.as_str().to_string(),
        model: String::new(),
        api_key: String::new(),
        base_url: String::new(),
        temperature: 0.1,
        max_tokens: 4096,
        timeout_seconds: 60,
    });
    if !api_key.is_empty() {
        config.api_key = api_key.to_string();
    }
    config
}

/// Pre-generate driver code for every action before the browser opens.
///
/// Returns a map `sequence id -> payload`, where the payload is an absolute
/// file path when the provider produced code, or inline template code when no
/// provider was reachable. Heart-beats once per action.
pub(crate) async fn pre_generate_code(
    context: &ActivityContext,
    code_root: &Path,
    workflow_id: &str,
    actions: &[SemanticAction],
    parameters: &HashMap<String, String>,
    provider_config: ProviderConfig,
) -> Result<HashMap<u32, String>, ActivityError> {
    let mut codes = HashMap::new();
    let provider = create_provider(provider_config);

    if !provider.is_available().await {
        tracing::warn!(provider = provider.name(),
            "Provider not available, using template-based code generation");
        for action in actions {
            codes.insert(
                action.sequence_id,
                template::generate_action_code(action, parameters),
            );
        }
        return Ok(codes);
    }

    let workflow_dir = code_root.join(workflow_id);
    tokio::fs::create_dir_all(&workflow_dir)
        .await
        .map_err(|error| ActivityError::Other(format!("failed to create code dir: {}", error)))?;

    let page = PageContext {
        url: "about:blank".to_string(),
        title: String::new(),
    };

    for (index, action) in actions.iter().enumerate() {
        context.record_heartbeat();
        tracing::info!(sequence = action.sequence_id, action_type = %action.action_type,
            progress = format!("{}/{}", index + 1, actions.len()), "Generating code for action");

        let code = match provider.generate_action_code(action, &page, 0, "").await {
            Ok(code) => code,
            Err(error) => {
                tracing::warn!(sequence = action.sequence_id, error = %error,
                    "Provider generation failed, using template fallback");
                template::generate_action_code(action, parameters)
            }
        };

        let file_path = workflow_dir.join(format!("action_{}.code", action.sequence_id));
        if let Err(error) = tokio::fs::write(&file_path, &code).await {
            tracing::error!(path = %file_path.display(), error = %error,
                "Failed to write generated code");
            continue;
        }

        let absolute = std::fs::canonicalize(&file_path).unwrap_or(file_path);
        codes.insert(action.sequence_id, absolute.display().to_string());
    }

    Ok(codes)
}

/// Launch the browser and register the session under a fresh id.
pub(crate) async fn initialize_browser(
    sessions: &SessionRegistry,
    config: &BrowserConfig,
) -> Result<String, ActivityError> {
    sessions
        .open_session(config)
        .await
        .map_err(|error| ActivityError::FatalBrowser(error.to_string()))
}

/// Close a session. Idempotent: missing sessions are a no-op.
pub(crate) async fn close_browser(
    sessions: &SessionRegistry,
    session_id: &str,
) -> Result<(), ActivityError> {
    sessions
        .close_session(session_id)
        .await
        .map(|_| ())
        .map_err(|error| ActivityError::Other(error.to_string()))
}

/// Execute one action: resolve its code, refine the selector from the code,
/// drive the browser, and record the result.
pub(crate) async fn execute_action(
    context: &ActivityContext,
    sessions: &SessionRegistry,
    session_id: &str,
    action: &SemanticAction,
    parameters: &HashMap<String, String>,
    provider_config: ProviderConfig,
    pre_generated: Option<&str>,
) -> Result<ActionResult, ActivityError> {
    let session = sessions
        .get(session_id)
        .await
        .map_err(|error| ActivityError::FatalBrowser(error.to_string()))?;

    let started = std::time::Instant::now();
    let mut result = ActionResult::new(String::new(), action.sequence_id);
    result.action_id = action.id.clone();
    result.executed_at = Some(now_ms());

    let code = resolve_action_code(
        &session,
        action,
        parameters,
        provider_config,
        pre_generated,
    )
    .await?;
    result.generated_code = code.clone();

    // The generated code is the source of truth for the selector it chose;
    // mine it rather than executing it.
    let mut action = action.clone();
    if matches!(action.action_type, ActionType::Click | ActionType::Input) {
        if let Some(refined) = refine_selector_from_code(&code) {
            if refined != action.target.selector {
                tracing::info!(old = %action.target.selector, new = %refined,
                    "Updating selector from generated code");
                action.target.selector = refined;
            }
        }
    }

    {
        let mut runtime = session.runtime().await;
        runtime
            .execute(&action, parameters)
            .await
            .map_err(ActivityError::from_driver)?;
    }

    result.status = RunStatus::Success;
    result.duration_ms = started.elapsed().as_millis() as i64;
    context.record_heartbeat();
    Ok(result)
}

async fn resolve_action_code(
    session: &retrace_browser::BrowserSession,
    action: &SemanticAction,
    parameters: &HashMap<String, String>,
    provider_config: ProviderConfig,
    pre_generated: Option<&str>,
) -> Result<String, ActivityError> {
    if let Some(payload) = pre_generated {
        if looks_like_path(payload) {
            return tokio::fs::read_to_string(payload).await.map_err(|error| {
                ActivityError::Other(format!(
                    "failed to read generated code '{}': {}",
                    payload, error
                ))
            });
        }
        return Ok(payload.to_string());
    }

    // On-the-fly path: ask the provider against the live page, falling back
    // to the template generator on any provider failure.
    let provider = create_provider(provider_config);
    if provider.is_available().await {
        let (url, title) = {
            let mut runtime = session.runtime().await;
            runtime.page_info().await
        };
        let page = PageContext { url, title };
        match provider.generate_action_code(action, &page, 0, "").await {
            Ok(code) => return Ok(code),
            Err(error) => {
                tracing::warn!(error = %error, "On-the-fly generation failed, using template");
            }
        }
    }

    Ok(template::generate_action_code(action, parameters))
}

/// Take a failure screenshot named after the action.
pub(crate) async fn take_screenshot(
    sessions: &SessionRegistry,
    screenshot_dir: &Path,
    session_id: &str,
    filename: &str,
) -> Result<String, ActivityError> {
    let session = sessions
        .get(session_id)
        .await
        .map_err(|error| ActivityError::FatalBrowser(error.to_string()))?;

    let target: PathBuf = screenshot_dir.join(filename);
    let mut runtime = session.runtime().await;
    let path = runtime
        .screenshot(&target)
        .await
        .map_err(|error| ActivityError::Other(error.to_string()))?;
    Ok(path.display().to_string())
}

pub(crate) fn looks_like_path(payload: &str) -> bool {
    payload.starts_with('/') || payload.contains(std::path::MAIN_SEPARATOR)
}

/// Extract the selector a generated `MustElement("...")` call targets.
pub(crate) fn refine_selector_from_code(code: &str) -> Option<String> {
    MUST_ELEMENT_RE
        .captures(code)
        .and_then(|captures| captures.get(1))
        .map(|capture| capture.as_str().to_string())
        .filter(|selector| !selector.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refine_selector_extracts_first_must_element() {
        let code = "elem := page.MustElement(\"input[name='q']\").MustWaitVisible()\n\
                    elem.MustSelectAllText().MustInput(searchQuery)\n";
        assert_eq!(
            refine_selector_from_code(code).as_deref(),
            Some("input[name='q']")
        );

        assert_eq!(refine_selector_from_code("no selectors here"), None);
    }

    #[test]
    fn path_detection_distinguishes_inline_code() {
        assert!(looks_like_path("/tmp/generated/action_1.code"));
        assert!(!looks_like_path("page.MustNavigate(\"x\")"));
    }

    #[test]
    fn unknown_provider_resolves_to_local_config() {
        let config = resolve_provider_config("mystery", "key-123");
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.api_key, "key-123");

        let config = resolve_provider_config("anthropic", "");
        assert_eq!(config.provider, "anthropic");
        assert!(config.api_key.is_empty());
    }
}
