//! Run registry: live progress snapshots and cancellation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use retrace_core::WorkflowResult;

/// Handle to one in-flight run: the progress snapshot served by the
/// `getProgress` query and the cancellation token the orchestrator races
/// activities against.
#[derive(Clone)]
pub struct RunHandle {
    progress: Arc<RwLock<WorkflowResult>>,
    cancel: CancellationToken,
}

impl RunHandle {
    fn new(run_id: &str) -> Self {
        Self {
            progress: Arc::new(RwLock::new(WorkflowResult::running(run_id))),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn snapshot(&self) -> WorkflowResult {
        self.progress.read().await.clone()
    }

    pub async fn update(&self, result: &WorkflowResult) {
        let mut progress = self.progress.write().await;
        *progress = result.clone();
    }
}

/// Process-wide map of in-flight runs.
#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<String, RunHandle>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, run_id: &str) -> RunHandle {
        let handle = RunHandle::new(run_id);
        let mut runs = self.runs.write().await;
        runs.insert(run_id.to_string(), handle.clone());
        handle
    }

    pub async fn deregister(&self, run_id: &str) {
        let mut runs = self.runs.write().await;
        runs.remove(run_id);
    }

    /// The `getProgress` query: a snapshot of the run's current result.
    pub async fn get_progress(&self, run_id: &str) -> Option<WorkflowResult> {
        let handle = {
            let runs = self.runs.read().await;
            runs.get(run_id).cloned()
        };
        match handle {
            Some(handle) => Some(handle.snapshot().await),
            None => None,
        }
    }

    /// Propagate cancellation; surfaces at the run's next suspension point.
    pub async fn cancel(&self, run_id: &str) -> bool {
        let runs = self.runs.read().await;
        match runs.get(run_id) {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn contains(&self, run_id: &str) -> bool {
        self.runs.read().await.contains_key(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::RunStatus;

    #[tokio::test]
    async fn progress_query_reflects_updates() {
        let registry = RunRegistry::new();
        let handle = registry.register("run-1").await;

        let mut result = handle.snapshot().await;
        assert_eq!(result.status, RunStatus::Running);

        result.status = RunStatus::Success;
        handle.update(&result).await;

        let progress = registry.get_progress("run-1").await.unwrap();
        assert_eq!(progress.status, RunStatus::Success);

        registry.deregister("run-1").await;
        assert!(registry.get_progress("run-1").await.is_none());
    }

    #[tokio::test]
    async fn cancel_trips_the_token() {
        let registry = RunRegistry::new();
        let handle = registry.register("run-1").await;
        assert!(!handle.cancel_token().is_cancelled());

        assert!(registry.cancel("run-1").await);
        assert!(handle.cancel_token().is_cancelled());

        assert!(!registry.cancel("missing").await);
    }
}
