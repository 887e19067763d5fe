//! Page runtime: executes semantic actions against a live page over CDP.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde_json::{Value, json};
use tokio::time::sleep;

use retrace_core::{ActionType, SemanticAction};

use crate::BrowserConfig;
use crate::cdp::CdpClient;
use crate::chromium::ChromiumProcess;
use crate::keys::{KeyDescriptor, MODIFIER_CTRL, key_descriptor};

const POLL_INTERVAL_MS: u64 = 100;
const NAVIGATION_TIMEOUT_SECS: u64 = 30;
const SELECTOR_TIMEOUT_MS: u64 = 10_000;
const MAX_DATA_ATTR_VALUE_LEN: usize = 50;

/// A live chromium target with an attached page session.
pub struct PageRuntime {
    process: ChromiumProcess,
    cdp: CdpClient,
    page_session_id: String,
}

impl PageRuntime {
    /// Launch chromium, create a blank page, and attach to it.
    pub async fn start(config: &BrowserConfig, profile_dir: &Path) -> Result<Self> {
        let process = ChromiumProcess::launch(
            config.headless,
            config.binary_path.as_deref(),
            profile_dir,
            config.launch_timeout_secs,
        )
        .await?;
        let mut cdp = CdpClient::connect(&process.ws_endpoint).await?;

        let create_result = cdp
            .send_command(None, "Target.createTarget", json!({"url": "about:blank"}))
            .await?;
        let target_id = create_result
            .get("targetId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Target.createTarget did not return targetId"))?
            .to_string();

        let attach_result = cdp
            .send_command(
                None,
                "Target.attachToTarget",
                json!({"targetId": target_id, "flatten": true}),
            )
            .await?;
        let page_session_id = attach_result
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Target.attachToTarget did not return sessionId"))?
            .to_string();

        cdp.send_command(Some(&page_session_id), "Runtime.enable", json!({}))
            .await?;
        cdp.send_command(Some(&page_session_id), "Page.enable", json!({}))
            .await?;

        Ok(Self {
            process,
            cdp,
            page_session_id,
        })
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        let _ = self
            .cdp
            .send_command(None, "Browser.close", json!({}))
            .await;
        self.process.shutdown().await
    }

    /// Execute one semantic action with the run's parameter bindings.
    pub async fn execute(
        &mut self,
        action: &SemanticAction,
        parameters: &HashMap<String, String>,
    ) -> Result<()> {
        let value = substitute_parameters(&action.value, parameters);

        match action.action_type {
            ActionType::Navigate => self.navigate(&value).await,
            ActionType::Click => {
                let selector = best_selector(action);
                self.wait_for_selector(&selector, SELECTOR_TIMEOUT_MS).await?;
                self.click_selector(&selector).await
            }
            ActionType::Input => {
                let selector = best_selector(action);
                self.wait_for_selector(&selector, SELECTOR_TIMEOUT_MS).await?;
                self.fill_selector(&selector, &value).await
            }
            ActionType::Keypress => {
                let descriptor = key_descriptor(&value);
                self.dispatch_key(&descriptor, 0).await
            }
            ActionType::Copy => self.dispatch_chord("c").await,
            ActionType::Paste => self.dispatch_chord("v").await,
            // Recorded but not reliably replayable.
            ActionType::Scroll => Ok(()),
            other => bail!("unsupported action type: {}", other),
        }
    }

    /// Navigate and wait for the load lifecycle.
    pub async fn navigate(&mut self, url: &str) -> Result<()> {
        let result = self
            .cdp
            .send_command(
                Some(&self.page_session_id.clone()),
                "Page.navigate",
                json!({"url": url}),
            )
            .await?;

        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            bail!("navigation failed: {}", error_text);
        }

        self.wait_for_load(Duration::from_secs(NAVIGATION_TIMEOUT_SECS))
            .await
    }

    async fn wait_for_load(&mut self, timeout_window: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            let ready_state = self
                .evaluate("document.readyState")
                .await
                .unwrap_or(Value::String("loading".to_string()));
            if ready_state.as_str() == Some("complete") {
                return Ok(());
            }

            if start.elapsed() > timeout_window {
                bail!("timed out waiting for page load");
            }

            // Drain queued CDP events while we wait.
            let _ = self
                .cdp
                .poll_event(Duration::from_millis(POLL_INTERVAL_MS))
                .await?;
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    /// Evaluate an expression in the page, returning its JSON value.
    pub async fn evaluate(&mut self, expression: &str) -> Result<Value> {
        let session_id = self.page_session_id.clone();
        let result = self
            .cdp
            .send_command(
                Some(&session_id),
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                }),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let message = exception
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or("JavaScript execution failed")
                .to_string();
            bail!("{}", message);
        }

        let remote = result.get("result").cloned().unwrap_or(Value::Null);
        if let Some(value) = remote.get("value") {
            return Ok(value.clone());
        }
        Ok(Value::Null)
    }

    /// Current URL and title, for provider page context.
    pub async fn page_info(&mut self) -> (String, String) {
        let url = self
            .evaluate("document.location.href")
            .await
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();
        let title = self
            .evaluate("document.title")
            .await
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();
        (url, title)
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout_ms: u64) -> Result<()> {
        let start = Instant::now();
        let timeout_window = Duration::from_millis(timeout_ms.max(1));

        loop {
            let script = format!(
                "(function() {{\n  const selector = {};\n  const element = document.querySelector(selector);\n  let visible = false;\n  if (element) {{\n    const style = window.getComputedStyle(element);\n    const rect = element.getBoundingClientRect();\n    visible = style.visibility !== 'hidden' && style.display !== 'none' && rect.width > 0 && rect.height > 0;\n  }}\n  return {{ present: !!element, visible }};\n}})()",
                serde_json::to_string(selector)?
            );

            let result = self.evaluate(&script).await?;
            let present = result
                .get("present")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let visible = result
                .get("visible")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if present && visible {
                return Ok(());
            }

            if start.elapsed() > timeout_window {
                bail!("element not found: {}", selector);
            }

            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    async fn click_selector(&mut self, selector: &str) -> Result<()> {
        let script = format!(
            "(function() {{\n  const selector = {};\n  const element = document.querySelector(selector);\n  if (!element) return {{ ok: false, error: `element not found: ${{selector}}` }};\n  element.click();\n  return {{ ok: true }};\n}})()",
            serde_json::to_string(selector)?
        );
        let result = self.evaluate(&script).await?;
        check_script_result(result)
    }

    /// Select-all then type: the recorded value replaces any existing text.
    async fn fill_selector(&mut self, selector: &str, value: &str) -> Result<()> {
        let script = format!(
            "(function() {{\n  const selector = {};\n  const value = {};\n  const element = document.querySelector(selector);\n  if (!element) return {{ ok: false, error: `element not found: ${{selector}}` }};\n  element.focus?.();\n  element.select?.();\n  element.value = value;\n  element.dispatchEvent(new Event('input', {{ bubbles: true }}));\n  element.dispatchEvent(new Event('change', {{ bubbles: true }}));\n  return {{ ok: true }};\n}})()",
            serde_json::to_string(selector)?,
            serde_json::to_string(value)?
        );
        let result = self.evaluate(&script).await?;
        check_script_result(result)
    }

    async fn dispatch_key(&mut self, descriptor: &KeyDescriptor, modifiers: u8) -> Result<()> {
        self.dispatch_key_event("keyDown", descriptor, modifiers, true)
            .await?;
        self.dispatch_key_event("keyUp", descriptor, modifiers, false)
            .await
    }

    /// Simulated Ctrl chord (copy/paste).
    async fn dispatch_chord(&mut self, letter: &str) -> Result<()> {
        let control = key_descriptor("Control");
        let key = key_descriptor(letter);
        self.dispatch_key_event("keyDown", &control, 0, false).await?;
        self.dispatch_key_event("keyDown", &key, MODIFIER_CTRL, false)
            .await?;
        self.dispatch_key_event("keyUp", &key, MODIFIER_CTRL, false)
            .await?;
        self.dispatch_key_event("keyUp", &control, 0, false).await
    }

    async fn dispatch_key_event(
        &mut self,
        event_type: &str,
        descriptor: &KeyDescriptor,
        modifiers: u8,
        include_text: bool,
    ) -> Result<()> {
        let mut params = serde_json::Map::new();
        params.insert("type".to_string(), Value::String(event_type.to_string()));
        params.insert("key".to_string(), Value::String(descriptor.key.clone()));
        params.insert("code".to_string(), Value::String(descriptor.code.clone()));
        params.insert(
            "windowsVirtualKeyCode".to_string(),
            Value::from(descriptor.virtual_key_code),
        );
        params.insert(
            "nativeVirtualKeyCode".to_string(),
            Value::from(descriptor.virtual_key_code),
        );
        params.insert("modifiers".to_string(), Value::from(modifiers));
        if include_text {
            if let Some(text) = &descriptor.text {
                params.insert("text".to_string(), Value::String(text.clone()));
                params.insert("unmodifiedText".to_string(), Value::String(text.clone()));
            }
        }

        let session_id = self.page_session_id.clone();
        self.cdp
            .send_command(
                Some(&session_id),
                "Input.dispatchKeyEvent",
                Value::Object(params),
            )
            .await?;
        Ok(())
    }

    /// Capture a PNG screenshot to `path`.
    pub async fn screenshot(&mut self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let session_id = self.page_session_id.clone();
        let result = self
            .cdp
            .send_command(
                Some(&session_id),
                "Page.captureScreenshot",
                json!({"format": "png", "fromSurface": true}),
            )
            .await?;

        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Page.captureScreenshot did not return image data"))?;
        let bytes = BASE64_STANDARD
            .decode(data)
            .map_err(|error| anyhow!("failed to decode screenshot data: {}", error))?;
        std::fs::write(path, bytes)?;
        Ok(path.to_path_buf())
    }
}

fn check_script_result(value: Value) -> Result<()> {
    if let Some(ok) = value.get("ok").and_then(Value::as_bool) {
        if ok {
            return Ok(());
        }
        let message = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown browser action error");
        bail!("{}", message);
    }
    Ok(())
}

/// Substitute run parameters into a recorded value: every `{{name}}`
/// occurrence is replaced, and a value that is exactly a parameter name
/// becomes that parameter's value.
pub fn substitute_parameters(value: &str, parameters: &HashMap<String, String>) -> String {
    let mut result = value.to_string();
    for (name, bound) in parameters {
        result = result.replace(&format!("{{{{{}}}}}", name), bound);
        if result == *name {
            result = bound.clone();
        }
    }
    result
}

/// Pick the most stable selector for the driver: the attribute ladder over
/// the target's attributes, else the recorded selector.
pub fn best_selector(action: &SemanticAction) -> String {
    let target = &action.target;
    let tag = target.tag.to_lowercase();

    for key in ["aria-label", "aria-placeholder", "role"] {
        if let Some(value) = target.attr(key) {
            if !value.is_empty() {
                return format!("{}[{}='{}']", tag, key, escape_attr(value));
            }
        }
    }

    for key in ["name", "placeholder", "title"] {
        if let Some(value) = target.attr(key) {
            if !value.is_empty() {
                return format!("{}[{}='{}']", tag, key, escape_attr(value));
            }
        }
    }

    for (key, value) in &target.attributes {
        if !key.starts_with("data-") || is_dynamic_token(key) {
            continue;
        }
        if let Some(value) = value.as_str() {
            if !value.is_empty() && value.len() <= MAX_DATA_ATTR_VALUE_LEN {
                return format!("{}[{}='{}']", tag, key, escape_attr(value));
            }
        }
    }

    if let Some(id) = target.attr("id") {
        if !id.is_empty() && !is_dynamic_token(id) {
            return format!("#{}", id);
        }
    }

    target.selector.clone()
}

/// Dynamic-identifier heuristic: a token containing both letters and digits
/// is treated as generated.
fn is_dynamic_token(token: &str) -> bool {
    let has_letter = token.chars().any(|c| c.is_alphabetic());
    let has_digit = token.chars().any(|c| c.is_numeric());
    has_letter && has_digit
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::ActionTarget;
    use serde_json::json;

    #[test]
    fn parameter_substitution_handles_both_forms() {
        let parameters = HashMap::from([("searchQuery".to_string(), "dogs".to_string())]);
        assert_eq!(
            substitute_parameters("find {{searchQuery}} now", &parameters),
            "find dogs now"
        );
        assert_eq!(substitute_parameters("searchQuery", &parameters), "dogs");
        assert_eq!(substitute_parameters("plain", &parameters), "plain");
    }

    #[test]
    fn best_selector_prefers_attributes_over_recorded_selector() {
        let mut action = SemanticAction::new(ActionType::Click, 0);
        action.target = ActionTarget {
            tag: "input".to_string(),
            selector: ".brittle".to_string(),
            ..Default::default()
        };
        action
            .target
            .attributes
            .insert("name".to_string(), json!("q"));
        assert_eq!(best_selector(&action), "input[name='q']");
    }

    #[test]
    fn best_selector_rejects_dynamic_ids() {
        let mut action = SemanticAction::new(ActionType::Click, 0);
        action.target = ActionTarget {
            tag: "button".to_string(),
            selector: ".fallback".to_string(),
            ..Default::default()
        };
        action
            .target
            .attributes
            .insert("id".to_string(), json!("btn-a7f3d2"));
        assert_eq!(best_selector(&action), ".fallback");
    }

    #[test]
    fn best_selector_accepts_any_stable_data_attribute() {
        let mut action = SemanticAction::new(ActionType::Click, 0);
        action.target = ActionTarget {
            tag: "button".to_string(),
            selector: ".fallback".to_string(),
            ..Default::default()
        };
        action
            .target
            .attributes
            .insert("data-action".to_string(), json!("submit-form"));
        assert_eq!(best_selector(&action), "button[data-action='submit-form']");
    }

    #[test]
    fn best_selector_rejects_generated_data_attributes() {
        let mut action = SemanticAction::new(ActionType::Click, 0);
        action.target = ActionTarget {
            tag: "button".to_string(),
            selector: ".fallback".to_string(),
            ..Default::default()
        };
        // Mixed-alphanumeric data key is treated as generated.
        action
            .target
            .attributes
            .insert("data-v2x".to_string(), json!("ok"));
        assert_eq!(best_selector(&action), ".fallback");

        // Overlong data values are skipped too.
        let mut action = SemanticAction::new(ActionType::Click, 0);
        action.target = ActionTarget {
            tag: "button".to_string(),
            selector: ".fallback".to_string(),
            ..Default::default()
        };
        action
            .target
            .attributes
            .insert("data-state".to_string(), json!("x".repeat(60)));
        assert_eq!(best_selector(&action), ".fallback");
    }
}
