//! Workflow orchestration
//!
//! The deterministic layer: sequences activities, applies the
//! continue-on-failure policy, serves the progress query, and guarantees the
//! deferred browser close on every exit path including cancellation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use retrace_browser::{BrowserConfig, SessionRegistry};
use retrace_core::{
    ActionResult, ActionType, InteractionRank, RunConfig, RunStatus, SemanticAction,
    WorkflowInput, WorkflowResult, new_id, now_ms,
};
use retrace_storage::Storage;

use crate::activities;
use crate::activity::run_activity;
use crate::error::ActivityError;
use crate::options::ActivityOptions;
use crate::runs::{RunHandle, RunRegistry};

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root for pre-generated code: `<root>/<workflow_id>/action_<seq>.code`.
    pub generated_code_root: PathBuf,
    /// Failure screenshots: `<dir>/<action_id>_failure.png`.
    pub screenshot_dir: PathBuf,
    pub browser: BrowserConfig,
    /// Bounded pool for concurrent activity executions.
    pub max_concurrent_activities: usize,
    /// Bounded pool for concurrent workflow orchestrations.
    pub max_concurrent_workflows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generated_code_root: PathBuf::from("generated_code"),
            screenshot_dir: std::env::temp_dir().join("retrace-screenshots"),
            browser: BrowserConfig::default(),
            max_concurrent_activities: 5,
            max_concurrent_workflows: 10,
        }
    }
}

/// Correlation ids returned when a run is started in the background.
#[derive(Debug, Clone)]
pub struct StartedRun {
    pub engine_workflow_id: String,
    pub engine_run_id: String,
}

/// The durable execution core. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct WorkflowEngine {
    config: Arc<EngineConfig>,
    sessions: Arc<SessionRegistry>,
    runs: Arc<RunRegistry>,
    storage: Option<Arc<Storage>>,
    activity_pool: Arc<Semaphore>,
    workflow_pool: Arc<Semaphore>,
}

impl WorkflowEngine {
    pub fn new(config: EngineConfig, storage: Option<Arc<Storage>>) -> Self {
        let activity_pool = Arc::new(Semaphore::new(config.max_concurrent_activities.max(1)));
        let workflow_pool = Arc::new(Semaphore::new(config.max_concurrent_workflows.max(1)));
        Self {
            config: Arc::new(config),
            sessions: Arc::new(SessionRegistry::new()),
            runs: Arc::new(RunRegistry::new()),
            storage,
            activity_pool,
            workflow_pool,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// The `getProgress` query for an in-flight run.
    pub async fn get_progress(&self, run_id: &str) -> Option<WorkflowResult> {
        self.runs.get_progress(run_id).await
    }

    /// Propagate cancellation to a run; it lands at the next suspension
    /// point.
    pub async fn cancel(&self, run_id: &str) -> bool {
        self.runs.cancel(run_id).await
    }

    /// Start a run in the background and return its correlation ids.
    pub async fn start_run(&self, input: WorkflowInput) -> StartedRun {
        let started = StartedRun {
            engine_workflow_id: format!("retrace-run-{}", input.run_id),
            engine_run_id: new_id(),
        };

        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine.run_workflow(input).await;
            tracing::info!(run_id = %result.run_id, status = %result.status,
                duration_ms = result.total_duration_ms, "Workflow run finished");
        });

        started
    }

    /// Execute one workflow to completion. Registers the run for progress
    /// queries and cancellation, and deregisters it on return.
    pub async fn run_workflow(&self, input: WorkflowInput) -> WorkflowResult {
        let _workflow_permit = self.workflow_pool.acquire().await;
        let handle = self.runs.register(&input.run_id).await;
        let result = self.execute_run(&handle, input).await;
        self.runs.deregister(&result.run_id).await;
        result
    }

    async fn execute_run(&self, handle: &RunHandle, input: WorkflowInput) -> WorkflowResult {
        tracing::info!(workflow_id = %input.workflow_id, run_id = %input.run_id,
            actions = input.actions.len(), provider = %input.llm_provider,
            "Starting workflow run");

        let started = Instant::now();
        let cancel = handle.cancel_token().clone();
        let mut result = WorkflowResult::running(&input.run_id);
        handle.update(&result).await;

        self.persist_run_status(&input.run_id, RunStatus::Running, "");

        let options = ActivityOptions::from_input(input.timeout_seconds, input.retry_attempts);
        let provider_config =
            activities::resolve_provider_config(&input.llm_provider, &input.api_key);

        // Pre-generation is a pure optimization; its failure is non-fatal.
        let pre_generated = {
            let config = provider_config.clone();
            let input_ref = &input;
            let outcome = run_activity(
                "pre_generate_code",
                &options,
                &self.activity_pool,
                &cancel,
                |context| {
                    let config = config.clone();
                    async move {
                        activities::pre_generate_code(
                            &context,
                            &self.config.generated_code_root,
                            &input_ref.workflow_id,
                            &input_ref.actions,
                            &input_ref.parameters,
                            config,
                        )
                        .await
                    }
                },
            )
            .await;

            match outcome {
                Ok((codes, _)) => codes,
                Err(failure) => {
                    if matches!(failure.error, ActivityError::Canceled) {
                        result.status = RunStatus::Canceled;
                        self.finish(handle, &mut result, started).await;
                        return result;
                    }
                    tracing::warn!(error = %failure,
                        "Pre-generation failed, will generate code during execution");
                    HashMap::new()
                }
            }
        };

        // Browser initialization failure aborts the run.
        let browser_config = BrowserConfig {
            headless: input.headless,
            ..self.config.browser.clone()
        };
        let session_id = {
            let outcome = run_activity(
                "initialize_browser",
                &options,
                &self.activity_pool,
                &cancel,
                |_context| {
                    let browser_config = browser_config.clone();
                    async move {
                        activities::initialize_browser(&self.sessions, &browser_config).await
                    }
                },
            )
            .await;

            match outcome {
                Ok((session_id, _)) => session_id,
                Err(failure) => {
                    result.status = if matches!(failure.error, ActivityError::Canceled) {
                        RunStatus::Canceled
                    } else {
                        RunStatus::Failed
                    };
                    if result.status == RunStatus::Failed {
                        result.error_message =
                            format!("Failed to initialize browser: {}", failure);
                    }
                    self.finish(handle, &mut result, started).await;
                    return result;
                }
            }
        };

        // Main loop; the deferred close below runs on every path out of it.
        self.run_action_loop(
            handle,
            &input,
            &options,
            &cancel,
            &session_id,
            &pre_generated,
            provider_config,
            &mut result,
        )
        .await;

        // Deferred close: must run even after cancellation, so it gets a
        // token that is not linked to the run's.
        let close_outcome = run_activity(
            "close_browser",
            &options.clone().single_attempt().without_heartbeat(),
            &self.activity_pool,
            &CancellationToken::new(),
            |_context| {
                let session_id = session_id.clone();
                async move { activities::close_browser(&self.sessions, &session_id).await }
            },
        )
        .await;
        if let Err(failure) = close_outcome {
            tracing::warn!(session_id = %session_id, error = %failure,
                "Browser close activity failed");
        }

        // Final status: anything still marked running resolves from the
        // accumulated action results.
        if result.status == RunStatus::Running {
            let all_success = result
                .action_results
                .iter()
                .all(|action| action.status == RunStatus::Success);
            result.status = if all_success {
                RunStatus::Success
            } else {
                RunStatus::Failed
            };
        }

        if result.error_message.is_empty() {
            result.error_message = result
                .action_results
                .iter()
                .find(|action| !action.error_message.is_empty())
                .map(|action| action.error_message.clone())
                .unwrap_or_default();
        }

        self.finish(handle, &mut result, started).await;
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_action_loop(
        &self,
        handle: &RunHandle,
        input: &WorkflowInput,
        options: &ActivityOptions,
        cancel: &CancellationToken,
        session_id: &str,
        pre_generated: &HashMap<u32, String>,
        provider_config: retrace_ai::ProviderConfig,
        result: &mut WorkflowResult,
    ) {
        for action in &input.actions {
            if cancel.is_cancelled() {
                result.status = RunStatus::Canceled;
                return;
            }

            tracing::info!(sequence = action.sequence_id, action_type = %action.action_type,
                "Executing action");

            let generated = pre_generated.get(&action.sequence_id).cloned();
            let outcome = run_activity(
                "execute_browser_action",
                options,
                &self.activity_pool,
                cancel,
                |context| {
                    let provider_config = provider_config.clone();
                    let generated = generated.clone();
                    let session_id = session_id.to_string();
                    async move {
                        activities::execute_action(
                            &context,
                            &self.sessions,
                            &session_id,
                            action,
                            &input.parameters,
                            provider_config,
                            generated.as_deref(),
                        )
                        .await
                    }
                },
            )
            .await;

            match outcome {
                Ok((mut action_result, attempts)) => {
                    action_result.run_id = input.run_id.clone();
                    action_result.retry_count = attempts.saturating_sub(1);
                    self.persist_action_result(&action_result);
                    result.action_results.push(action_result);
                }
                Err(failure) => {
                    if matches!(failure.error, ActivityError::Canceled) {
                        // No further action results after cancellation.
                        result.status = RunStatus::Canceled;
                        return;
                    }

                    let mut action_result =
                        ActionResult::new(input.run_id.clone(), action.sequence_id);
                    action_result.action_id = action.id.clone();
                    action_result.status = RunStatus::Failed;
                    action_result.retry_count = failure.attempts.saturating_sub(1);
                    action_result.error_message = failure.error.to_string();
                    action_result.executed_at = Some(now_ms());

                    action_result.screenshot_path = self
                        .capture_failure_screenshot(options, session_id, action)
                        .await
                        .unwrap_or_default();

                    self.persist_action_result(&action_result);
                    result.action_results.push(action_result);

                    if !should_continue_on_failure(action) {
                        result.status = RunStatus::Failed;
                        result.error_message =
                            format!("Action {} failed: {}", action.action_type, failure);
                        handle.update(result).await;
                        return;
                    }
                }
            }

            handle.update(result).await;
        }
    }

    async fn capture_failure_screenshot(
        &self,
        options: &ActivityOptions,
        session_id: &str,
        action: &SemanticAction,
    ) -> Option<String> {
        let action_ref = if action.id.is_empty() {
            format!("seq_{}", action.sequence_id)
        } else {
            action.id.clone()
        };
        let filename = format!("{}_failure.png", action_ref);

        let outcome = run_activity(
            "take_screenshot",
            &options.clone().single_attempt().without_heartbeat(),
            &self.activity_pool,
            &CancellationToken::new(),
            |_context| {
                let filename = filename.clone();
                let session_id = session_id.to_string();
                async move {
                    activities::take_screenshot(
                        &self.sessions,
                        &self.config.screenshot_dir,
                        &session_id,
                        &filename,
                    )
                    .await
                }
            },
        )
        .await;

        match outcome {
            Ok((path, _)) => Some(path),
            Err(failure) => {
                tracing::warn!(error = %failure, "Failure screenshot could not be captured");
                None
            }
        }
    }

    async fn finish(&self, handle: &RunHandle, result: &mut WorkflowResult, started: Instant) {
        result.total_duration_ms = started.elapsed().as_millis() as i64;
        handle.update(result).await;
        self.persist_run_status(&result.run_id, result.status, &result.error_message);
    }

    /// Best-effort persistence: the engine stays the source of truth via the
    /// progress query, so storage failures are logged and skipped.
    fn persist_run_status(&self, run_id: &str, status: RunStatus, error_message: &str) {
        if let Some(storage) = &self.storage {
            if let Err(error) = storage.runs.update_status(run_id, status, error_message) {
                tracing::warn!(run_id, error = %error, "Failed to persist run status");
            }
        }
    }

    fn persist_action_result(&self, action_result: &ActionResult) {
        if let Some(storage) = &self.storage {
            if let Err(error) = storage.results.put(action_result) {
                tracing::warn!(run_id = %action_result.run_id,
                    sequence = action_result.sequence_id, error = %error,
                    "Failed to persist action result");
            }
        }
    }

    /// Fan out N child runs of the single-run workflow; the result slice
    /// preserves input order.
    pub async fn run_parallel(&self, input: ParallelInput) -> ParallelResult {
        tracing::info!(workflow_id = %input.workflow_id, runs = input.run_configs.len(),
            "Starting parallel workflow runs");

        let children = input.run_configs.iter().map(|run_config| {
            let child_input = WorkflowInput {
                workflow_id: input.workflow_id.clone(),
                run_id: run_config.run_id.clone(),
                parameters: run_config.parameters.clone(),
                actions: input.actions.clone(),
                llm_provider: input.llm_provider.clone(),
                api_key: input.api_key.clone(),
                headless: input.headless,
                timeout_seconds: 300,
                retry_attempts: 3,
            };
            self.run_workflow(child_input)
        });

        let results = futures::future::join_all(children).await;
        ParallelResult { results }
    }
}

/// Continue-on-failure policy: low-rank actions may fail without stopping
/// the run; navigations and inputs are always fatal.
pub(crate) fn should_continue_on_failure(action: &SemanticAction) -> bool {
    if action.interaction_rank == InteractionRank::Low {
        return true;
    }
    !matches!(
        action.action_type,
        ActionType::Navigate | ActionType::Input
    )
}

/// Input for the parallel fan-out variant.
#[derive(Debug, Clone)]
pub struct ParallelInput {
    pub workflow_id: String,
    pub actions: Vec<SemanticAction>,
    pub run_configs: Vec<RunConfig>,
    pub llm_provider: String,
    pub api_key: String,
    pub headless: bool,
}

/// Results of the fan-out, indexed by input position.
#[derive(Debug, Clone)]
pub struct ParallelResult {
    pub results: Vec<WorkflowResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(action_type: ActionType, rank: InteractionRank) -> SemanticAction {
        let mut action = SemanticAction::new(action_type, 0);
        action.interaction_rank = rank;
        action
    }

    #[test]
    fn continue_policy_allows_low_rank_failures() {
        assert!(should_continue_on_failure(&action(
            ActionType::Click,
            InteractionRank::Low
        )));
        assert!(should_continue_on_failure(&action(
            ActionType::Click,
            InteractionRank::High
        )));
        assert!(should_continue_on_failure(&action(
            ActionType::Keypress,
            InteractionRank::Medium
        )));
    }

    #[test]
    fn navigate_and_input_failures_are_fatal() {
        assert!(!should_continue_on_failure(&action(
            ActionType::Navigate,
            InteractionRank::High
        )));
        assert!(!should_continue_on_failure(&action(
            ActionType::Input,
            InteractionRank::High
        )));
        // Unless the action itself was low-rank.
        assert!(should_continue_on_failure(&action(
            ActionType::Input,
            InteractionRank::Low
        )));
    }

    #[tokio::test]
    async fn progress_query_and_cancel_address_registered_runs() {
        let engine = WorkflowEngine::new(EngineConfig::default(), None);
        assert!(engine.get_progress("missing").await.is_none());
        assert!(!engine.cancel("missing").await);
    }
}
