//! Activity options and retry policy

use std::time::Duration;

/// Exponential backoff policy applied to retryable activity failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub maximum_interval: Duration,
    pub maximum_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(60),
            maximum_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given the 1-based attempt that just
    /// failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self
            .backoff_coefficient
            .powi(attempt.saturating_sub(1) as i32);
        let delay = self.initial_interval.as_millis() as f64 * multiplier;
        let delay = Duration::from_millis(delay as u64);
        delay.min(self.maximum_interval)
    }
}

/// Per-activity execution options.
#[derive(Debug, Clone)]
pub struct ActivityOptions {
    /// Maximum wall-clock time for a single attempt.
    pub start_to_close: Duration,
    /// Heart-beating activities must beat within this window to stay alive.
    /// `None` disables the watchdog.
    pub heartbeat_timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl ActivityOptions {
    /// Options derived from a workflow input: start-to-close from the input
    /// timeout, 30s heartbeat, and the standard backoff.
    pub fn from_input(timeout_seconds: u64, retry_attempts: u32) -> Self {
        Self {
            start_to_close: Duration::from_secs(timeout_seconds.max(1)),
            heartbeat_timeout: Some(Duration::from_secs(30)),
            retry: RetryPolicy {
                maximum_attempts: retry_attempts.max(1),
                ..Default::default()
            },
        }
    }

    pub fn without_heartbeat(mut self) -> Self {
        self.heartbeat_timeout = None;
        self
    }

    pub fn single_attempt(mut self) -> Self {
        self.retry.maximum_attempts = 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(7), Duration::from_secs(60));
        assert_eq!(policy.delay_for(20), Duration::from_secs(60));
    }

    #[test]
    fn options_from_input_clamp_attempts() {
        let options = ActivityOptions::from_input(300, 0);
        assert_eq!(options.retry.maximum_attempts, 1);
        assert_eq!(options.start_to_close, Duration::from_secs(300));
        assert_eq!(options.heartbeat_timeout, Some(Duration::from_secs(30)));
    }
}
