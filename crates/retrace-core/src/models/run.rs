//! Workflow run, action result, and execution input/output model

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::action::SemanticAction;

/// Status of a run or of a single action result.
///
/// Transitions are monotone: `pending -> running -> {success|failed|canceled}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution of a workflow definition with a bound parameter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: String,
    pub workflow_id: String,
    #[serde(default)]
    pub engine_workflow_id: String,
    #[serde(default)]
    pub engine_run_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub started_at: Option<i64>,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_results: Vec<ActionResult>,
}

impl WorkflowRun {
    pub fn new(workflow_id: impl Into<String>, parameters: HashMap<String, String>) -> Self {
        Self {
            id: crate::new_id(),
            workflow_id: workflow_id.into(),
            engine_workflow_id: String::new(),
            engine_run_id: String::new(),
            status: RunStatus::Pending,
            parameters,
            started_at: None,
            completed_at: None,
            error_message: String::new(),
            action_results: Vec::new(),
        }
    }

    /// Mark the run as started. `started_at` becomes non-null exactly when
    /// the status advances past pending.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(crate::now_ms());
    }

    /// Mark the run with a terminal status.
    pub fn finish(&mut self, status: RunStatus, error_message: impl Into<String>) {
        self.status = status;
        self.completed_at = Some(crate::now_ms());
        self.error_message = error_message.into();
    }
}

/// Result of executing one action inside a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub action_id: String,
    pub sequence_id: u32,
    pub status: RunStatus,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub screenshot_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub generated_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    #[serde(default)]
    pub executed_at: Option<i64>,
    #[serde(default)]
    pub duration_ms: i64,
}

impl ActionResult {
    pub fn new(run_id: impl Into<String>, sequence_id: u32) -> Self {
        Self {
            id: crate::new_id(),
            run_id: run_id.into(),
            action_id: String::new(),
            sequence_id,
            status: RunStatus::Running,
            retry_count: 0,
            screenshot_path: String::new(),
            generated_code: String::new(),
            error_message: String::new(),
            executed_at: None,
            duration_ms: 0,
        }
    }
}

/// Input for one durable workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub workflow_id: String,
    pub run_id: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    pub actions: Vec<SemanticAction>,
    #[serde(default)]
    pub llm_provider: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

fn default_headless() -> bool {
    true
}

fn default_timeout() -> u64 {
    300
}

fn default_retry_attempts() -> u32 {
    3
}

/// Outcome of one durable workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub action_results: Vec<ActionResult>,
    #[serde(default)]
    pub total_duration_ms: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

impl WorkflowResult {
    pub fn running(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::Running,
            action_results: Vec::new(),
            total_duration_ms: 0,
            error_message: String::new(),
        }
    }
}

/// One run configuration inside a parallel fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub run_id: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_lifecycle_sets_timestamps() {
        let mut run = WorkflowRun::new("wf-1", HashMap::new());
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.started_at.is_none());

        run.start();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.started_at.is_some());
        assert!(run.completed_at.is_none());

        run.finish(RunStatus::Success, "");
        assert!(run.status.is_terminal());
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Canceled).unwrap(),
            "\"canceled\""
        );
    }
}
