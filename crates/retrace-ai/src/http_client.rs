//! HTTP client construction for provider backends.

use std::time::Duration;

use reqwest::Client;

/// Build a provider HTTP client with the configured request timeout.
pub fn build_http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .unwrap_or_default()
}
