//! Server configuration from environment variables.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub screenshot_dir: PathBuf,
    pub generated_code_root: PathBuf,
    pub headless: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("RETRACE_HOST", "0.0.0.0"),
            port: std::env::var("RETRACE_PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(8090),
            db_path: env_or("RETRACE_DB_PATH", "retrace.db"),
            screenshot_dir: PathBuf::from(env_or("RETRACE_SCREENSHOT_DIR", "/tmp/screenshots")),
            generated_code_root: PathBuf::from(env_or(
                "RETRACE_GENERATED_CODE_DIR",
                "generated_code",
            )),
            headless: env_or("RETRACE_HEADLESS", "true") != "false",
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
