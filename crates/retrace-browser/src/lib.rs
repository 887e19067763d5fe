//! Retrace browser runtime
//!
//! Chromium-over-CDP driver for replaying semantic actions: process launch,
//! a minimal CDP websocket client, a page runtime that executes one semantic
//! action at a time, and a process-wide session registry keyed by session id.
//! No driver package is required; the runtime speaks CDP directly.

mod cdp;
mod chromium;
mod keys;
mod runtime;

pub use cdp::CdpClient;
pub use chromium::{ChromiumProcess, resolve_chromium_binary};
pub use runtime::{PageRuntime, substitute_parameters};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::{Mutex, RwLock};

/// Browser launch configuration.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    /// Optional chromium binary override; otherwise resolved from env/PATH.
    pub binary_path: Option<String>,
    /// Root directory for per-session profile dirs.
    pub root_dir: PathBuf,
    pub launch_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            binary_path: None,
            root_dir: std::env::temp_dir().join("retrace-browser"),
            launch_timeout_secs: 30,
        }
    }
}

/// One live browser session owned by a run.
pub struct BrowserSession {
    pub id: String,
    pub created_at_ms: i64,
    pub profile_dir: PathBuf,
    runtime: Mutex<PageRuntime>,
}

impl BrowserSession {
    /// Lock the page runtime for exclusive use.
    pub async fn runtime(&self) -> tokio::sync::MutexGuard<'_, PageRuntime> {
        self.runtime.lock().await
    }
}

/// Process-wide map of live browser sessions.
///
/// Shared across activities; guarded by a reader/writer lock. Sessions are
/// inserted by the initialize activity and removed exactly once by the
/// deferred close activity.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<BrowserSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch a browser and register the session under a fresh id.
    pub async fn open_session(&self, config: &BrowserConfig) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let profile_dir = config.root_dir.join(&id);
        std::fs::create_dir_all(&profile_dir)?;

        let runtime = PageRuntime::start(config, &profile_dir).await?;
        let session = Arc::new(BrowserSession {
            id: id.clone(),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
            profile_dir,
            runtime: Mutex::new(runtime),
        });

        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), session);
        Ok(id)
    }

    pub async fn get(&self, session_id: &str) -> Result<Arc<BrowserSession>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| anyhow!("browser session not found: {}", session_id))
    }

    /// Close and deregister a session. Missing sessions are a no-op, which
    /// makes the deferred close activity idempotent.
    pub async fn close_session(&self, session_id: &str) -> Result<bool> {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(session_id)
        };

        let Some(session) = session else {
            return Ok(false);
        };

        {
            let mut runtime = session.runtime.lock().await;
            if let Err(error) = runtime.shutdown().await {
                tracing::warn!(session_id, error = %error, "Browser shutdown error");
            }
        }

        if session.profile_dir.exists() {
            let _ = std::fs::remove_dir_all(&session.profile_dir);
        }
        Ok(true)
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closing_unknown_session_is_a_noop() {
        let registry = SessionRegistry::new();
        assert!(!registry.close_session("missing").await.unwrap());
        assert!(registry.is_empty().await);
    }
}
