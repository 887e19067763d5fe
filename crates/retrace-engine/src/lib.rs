//! Retrace engine - durable execution core
//!
//! Runs one workflow per invocation as a sequence of activities: pre-generate
//! driver code, initialize a browser session, execute each action with
//! retry/timeout/heartbeat, capture screenshots on failure, expose progress
//! via query, and release the browser on every exit path. The orchestration
//! layer is deterministic: all I/O, clocks, and randomness live inside
//! activities; the orchestrator only awaits activity calls and child runs.

mod activities;
mod activity;
mod error;
mod options;
mod runs;
mod workflow;

pub use activity::ActivityContext;
pub use error::ActivityError;
pub use options::{ActivityOptions, RetryPolicy};
pub use runs::{RunHandle, RunRegistry};
pub use workflow::{
    EngineConfig, ParallelInput, ParallelResult, StartedRun, WorkflowEngine,
};
