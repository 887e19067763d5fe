//! Workflow definition and parameter model

use serde::{Deserialize, Serialize};

use super::action::SemanticAction;

/// Inferred data type of a workflow parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Email,
    Url,
}

/// Whether a recorded value is user-variable at run time or fixed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Variable,
    Fixed,
}

/// A recording value flagged as user-variable at run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    #[serde(default)]
    pub default_value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub required: bool,
    pub token_type: TokenType,
    #[serde(default)]
    pub source_action: u32,
}

/// A stored workflow created from a recorded session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub start_url: String,
    #[serde(default)]
    pub actions: Vec<SemanticAction>,
    #[serde(default)]
    pub parameters: Vec<WorkflowParameter>,
    #[serde(default)]
    pub is_generated: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        let now = crate::now_ms();
        Self {
            id: crate::new_id(),
            name: name.into(),
            start_url: String::new(),
            actions: Vec::new(),
            parameters: Vec::new(),
            is_generated: false,
            created_at: now,
            updated_at: now,
        }
    }
}
