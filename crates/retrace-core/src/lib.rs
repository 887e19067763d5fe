//! Retrace core - shared data model
//!
//! Types that cross crate boundaries: the hybrid event stream produced by the
//! recording tool, serialized DOM nodes, semantic actions with their targets
//! and parameters, and the workflow definition / run / result records the rest
//! of the system persists and executes.

pub mod models;

pub use models::action::{
    ActionTarget, ActionType, InteractionRank, SemanticAction, truncate_text,
};
pub use models::event::{
    AttributeMutation, EventSource, EventTarget, EventType, HybridEvent, IncrementalData,
    KeyModifiers, MediaData, MetaData, NodeAddition, NodeRemoval, RecorderEventType,
    SerializedNode, TextMutation, incremental_source, mouse_interaction,
};
pub use models::run::{
    ActionResult, RunConfig, RunStatus, WorkflowInput, WorkflowResult, WorkflowRun,
};
pub use models::workflow::{
    ParameterType, TokenType, WorkflowDefinition, WorkflowParameter,
};

/// Current UTC time in milliseconds since the epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a fresh entity id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
