//! Chromium process management

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow, bail};
use serde_json::Value;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};

const CDP_POLL_INTERVAL_MS: u64 = 100;
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

pub struct ChromiumProcess {
    child: Child,
    pub ws_endpoint: String,
}

impl ChromiumProcess {
    /// Launch chromium with a dedicated profile dir and a free debugging
    /// port, and wait for the CDP endpoint to come up.
    pub async fn launch(
        headless: bool,
        binary_override: Option<&str>,
        profile_dir: &Path,
        timeout_secs: u64,
    ) -> Result<Self> {
        let chromium = binary_override
            .map(str::to_string)
            .or_else(resolve_chromium_binary)
            .ok_or_else(|| {
                anyhow!("chromium executable not found; set RETRACE_CHROMIUM_PATH or install chromium")
            })?;
        let debug_port = allocate_free_port()?;

        let mut args = vec![
            format!("--remote-debugging-port={}", debug_port),
            format!("--user-data-dir={}", profile_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "about:blank".to_string(),
        ];

        if headless {
            args.push("--headless=new".to_string());
            args.push("--hide-scrollbars".to_string());
        }

        let mut command = Command::new(&chromium);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|error| anyhow!("failed to launch chromium '{}': {}", chromium, error))?;

        let ws_endpoint = wait_for_debugger_ws_url(debug_port, timeout_secs, &mut child).await?;
        Ok(Self { child, ws_endpoint })
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        let wait_result = timeout(
            Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
            self.child.wait(),
        )
        .await;

        match wait_result {
            Ok(_) => Ok(()),
            Err(_) => {
                self.child.kill().await?;
                Ok(())
            }
        }
    }
}

async fn wait_for_debugger_ws_url(
    port: u16,
    timeout_secs: u64,
    child: &mut Child,
) -> Result<String> {
    let endpoint = format!("http://127.0.0.1:{}/json/version", port);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let started = Instant::now();
    let timeout_window = Duration::from_secs(timeout_secs.max(1));

    loop {
        if let Some(status) = child.try_wait()? {
            bail!("chromium exited before CDP endpoint became available: {}", status);
        }

        if let Ok(response) = client.get(&endpoint).send().await {
            if response.status().is_success() {
                if let Ok(body) = response.json::<Value>().await {
                    if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(Value::as_str) {
                        return Ok(ws_url.to_string());
                    }
                }
            }
        }

        if started.elapsed() > timeout_window {
            bail!("timed out waiting for CDP endpoint at {}", endpoint);
        }

        sleep(Duration::from_millis(CDP_POLL_INTERVAL_MS)).await;
    }
}

fn allocate_free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Find a chromium binary: env overrides first, then well-known names on
/// PATH.
pub fn resolve_chromium_binary() -> Option<String> {
    for key in ["RETRACE_CHROMIUM_PATH", "CHROME_BIN", "CHROMIUM_PATH"] {
        if let Ok(value) = std::env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() && PathBuf::from(trimmed).exists() {
                return Some(trimmed.to_string());
            }
        }
    }

    let candidates = [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "chrome",
    ];
    for name in candidates {
        if is_executable_in_path(name) {
            return Some(name.to_string());
        }
    }

    None
}

fn is_executable_in_path(name: &str) -> bool {
    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(name).exists())
}
