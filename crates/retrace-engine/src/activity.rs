//! Activity runner
//!
//! Wraps every activity invocation with the configured start-to-close
//! timeout, the retry policy, a heartbeat watchdog, and cancellation.
//! Cancellation is observed before each attempt and raced against the
//! attempt itself, so a canceled run surfaces at its next suspension point.

use std::future::Future;
use std::time::Instant;

use tokio::sync::{Semaphore, watch};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::error::{ActivityError, ActivityFailure};
use crate::options::ActivityOptions;

/// Handed to each activity attempt; long-running activities beat through it.
#[derive(Clone)]
pub struct ActivityContext {
    heartbeat: watch::Sender<Instant>,
    cancel: CancellationToken,
}

impl ActivityContext {
    pub fn record_heartbeat(&self) {
        let _ = self.heartbeat.send(Instant::now());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Run one activity under the options, returning the value and the number of
/// attempts consumed.
pub(crate) async fn run_activity<T, F, Fut>(
    name: &str,
    options: &ActivityOptions,
    pool: &Semaphore,
    cancel: &CancellationToken,
    activity: F,
) -> Result<(T, u32), ActivityFailure>
where
    F: Fn(ActivityContext) -> Fut,
    Fut: Future<Output = Result<T, ActivityError>>,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        if cancel.is_cancelled() {
            return Err(ActivityFailure {
                error: ActivityError::Canceled,
                attempts: attempt,
            });
        }

        // Bounded activity pool; acquisition itself is a suspension point.
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ActivityFailure { error: ActivityError::Canceled, attempts: attempt });
            }
            permit = pool.acquire() => permit,
        };
        let _permit = match permit {
            Ok(permit) => permit,
            Err(_) => {
                return Err(ActivityFailure {
                    error: ActivityError::Other("activity pool closed".to_string()),
                    attempts: attempt,
                });
            }
        };

        let (heartbeat_tx, heartbeat_rx) = watch::channel(Instant::now());
        let context = ActivityContext {
            heartbeat: heartbeat_tx,
            cancel: cancel.clone(),
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ActivityError::Canceled),
            _ = heartbeat_watchdog(heartbeat_rx, options.heartbeat_timeout) => {
                Err(ActivityError::Timeout(format!(
                    "activity '{}' missed its heartbeat window", name
                )))
            }
            result = timeout(options.start_to_close, activity(context)) => match result {
                Ok(result) => result,
                Err(_) => Err(ActivityError::Timeout(format!(
                    "activity '{}' exceeded start-to-close of {:?}",
                    name, options.start_to_close
                ))),
            },
        };

        match outcome {
            Ok(value) => return Ok((value, attempt)),
            Err(error) => {
                let exhausted = attempt >= options.retry.maximum_attempts;
                if !error.is_retryable() || exhausted {
                    tracing::warn!(activity = name, attempt, error = %error, "Activity failed");
                    return Err(ActivityFailure {
                        error,
                        attempts: attempt,
                    });
                }

                let delay = options.retry.delay_for(attempt);
                tracing::debug!(activity = name, attempt, delay_ms = delay.as_millis() as u64,
                    error = %error, "Retrying activity");

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(ActivityFailure {
                            error: ActivityError::Canceled,
                            attempts: attempt,
                        });
                    }
                    _ = sleep(delay) => {}
                }
            }
        }
    }
}

/// Resolves when the activity has gone longer than `window` without a beat.
/// Never resolves when heart-beating is disabled.
async fn heartbeat_watchdog(
    mut heartbeat: watch::Receiver<Instant>,
    window: Option<std::time::Duration>,
) {
    let Some(window) = window else {
        std::future::pending::<()>().await;
        return;
    };

    loop {
        let last_beat = *heartbeat.borrow_and_update();
        let deadline = last_beat + window;
        let now = Instant::now();
        if now >= deadline {
            return;
        }

        tokio::select! {
            _ = sleep(deadline - now) => {
                if *heartbeat.borrow() <= last_beat {
                    return;
                }
            }
            changed = heartbeat.changed() => {
                if changed.is_err() {
                    // Sender dropped: the attempt finished; park forever and
                    // let the main future win the select.
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RetryPolicy;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_options(max_attempts: u32) -> ActivityOptions {
        ActivityOptions {
            start_to_close: Duration::from_millis(200),
            heartbeat_timeout: None,
            retry: RetryPolicy {
                initial_interval: Duration::from_millis(1),
                backoff_coefficient: 2.0,
                maximum_interval: Duration::from_millis(10),
                maximum_attempts: max_attempts,
            },
        }
    }

    #[tokio::test]
    async fn retries_until_success_and_reports_attempts() {
        let pool = Semaphore::new(5);
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let calls_ref = calls.clone();
        let (value, attempts) = run_activity(
            "flaky",
            &fast_options(5),
            &pool,
            &cancel,
            move |_context| {
                let calls = calls_ref.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ActivityError::Selector("not yet".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_stop_immediately() {
        let pool = Semaphore::new(5);
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let calls_ref = calls.clone();
        let failure = run_activity(
            "fatal",
            &fast_options(5),
            &pool,
            &cancel,
            move |_context| {
                let calls = calls_ref.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ActivityError::FatalBrowser("gone".to_string()))
                }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(failure.error, ActivityError::FatalBrowser(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempts_are_capped() {
        let pool = Semaphore::new(5);
        let cancel = CancellationToken::new();

        let failure = run_activity("always-fails", &fast_options(3), &pool, &cancel, |_context| {
            async { Err::<(), _>(ActivityError::Selector("missing".to_string())) }
        })
        .await
        .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(matches!(failure.error, ActivityError::Selector(_)));
    }

    #[tokio::test]
    async fn start_to_close_timeout_is_enforced() {
        let pool = Semaphore::new(5);
        let cancel = CancellationToken::new();

        let failure = run_activity("slow", &fast_options(1), &pool, &cancel, |_context| {
            async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(failure.error, ActivityError::Timeout(_)));
    }

    #[tokio::test]
    async fn cancellation_preempts_the_attempt() {
        let pool = Semaphore::new(5);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let failure = run_activity("hung", &fast_options(3), &pool, &cancel, |_context| {
            async {
                sleep(Duration::from_secs(30)).await;
                Ok(())
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(failure.error, ActivityError::Canceled));
    }

    #[tokio::test]
    async fn heartbeat_watchdog_kills_silent_activities() {
        let pool = Semaphore::new(5);
        let cancel = CancellationToken::new();
        let options = ActivityOptions {
            start_to_close: Duration::from_secs(30),
            heartbeat_timeout: Some(Duration::from_millis(50)),
            ..fast_options(1)
        };

        let failure = run_activity("silent", &options, &pool, &cancel, |_context| {
            async {
                sleep(Duration::from_secs(10)).await;
                Ok(())
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(failure.error, ActivityError::Timeout(_)));
    }

    #[tokio::test]
    async fn heartbeats_keep_long_activities_alive() {
        let pool = Semaphore::new(5);
        let cancel = CancellationToken::new();
        let options = ActivityOptions {
            start_to_close: Duration::from_secs(30),
            heartbeat_timeout: Some(Duration::from_millis(80)),
            ..fast_options(1)
        };

        let (value, _) = run_activity("beating", &options, &pool, &cancel, |context| {
            async move {
                for _ in 0..5 {
                    sleep(Duration::from_millis(30)).await;
                    context.record_heartbeat();
                }
                Ok("done")
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "done");
    }
}
