//! Activity error taxonomy
//!
//! Kinds, not concrete types: the retry policy keys off the kind. Fatal
//! browser errors and invalid selectors are declared non-retryable; provider
//! errors never fail an action (callers fall back to the template generator);
//! cancellation is terminal and skips retries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActivityError {
    /// The driver could not locate an element; retryable up to the policy.
    #[error("selector error: {0}")]
    Selector(String),

    /// A selector the driver cannot ever satisfy. Non-retryable.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// The browser process or CDP channel is gone. Non-retryable.
    #[error("fatal browser error: {0}")]
    FatalBrowser(String),

    /// An LLM backend call failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// The activity exceeded its start-to-close or heartbeat window.
    #[error("activity timed out: {0}")]
    Timeout(String),

    /// Engine-sourced cancellation.
    #[error("activity canceled")]
    Canceled,

    /// The external store was unreachable.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl ActivityError {
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::FatalBrowser(_) | Self::InvalidSelector(_) | Self::Canceled
        )
    }

    /// Classify a raw driver error into a kind the retry policy understands.
    pub fn from_driver(error: anyhow::Error) -> Self {
        let message = error.to_string();
        if message.contains("is not a valid selector") {
            return Self::InvalidSelector(message);
        }
        if message.contains("element not found") {
            return Self::Selector(message);
        }
        if message.contains("browser session not found")
            || message.contains("chromium exited")
            || message.contains("CDP websocket")
        {
            return Self::FatalBrowser(message);
        }
        Self::Other(message)
    }
}

/// An activity failure annotated with how many attempts were consumed.
#[derive(Debug)]
pub struct ActivityFailure {
    pub error: ActivityError,
    pub attempts: u32,
}

impl std::fmt::Display for ActivityFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_the_non_retry_list() {
        assert!(ActivityError::Selector("x".into()).is_retryable());
        assert!(ActivityError::Timeout("x".into()).is_retryable());
        assert!(ActivityError::Provider("x".into()).is_retryable());
        assert!(!ActivityError::FatalBrowser("x".into()).is_retryable());
        assert!(!ActivityError::InvalidSelector("x".into()).is_retryable());
        assert!(!ActivityError::Canceled.is_retryable());
    }

    #[test]
    fn driver_errors_are_classified() {
        let error = ActivityError::from_driver(anyhow::anyhow!("element not found: #x"));
        assert!(matches!(error, ActivityError::Selector(_)));

        let error = ActivityError::from_driver(anyhow::anyhow!("CDP websocket closed by peer"));
        assert!(matches!(error, ActivityError::FatalBrowser(_)));

        let error = ActivityError::from_driver(anyhow::anyhow!(
            "'##' is not a valid selector"
        ));
        assert!(matches!(error, ActivityError::InvalidSelector(_)));

        let error = ActivityError::from_driver(anyhow::anyhow!("unsupported action type: drag"));
        assert!(matches!(error, ActivityError::Other(_)));
    }
}
