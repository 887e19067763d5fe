//! Semantic action model
//!
//! The extractor lowers the raw event stream into these. Every action carries
//! a dense 1-based sequence id, a typed kind, a target element description,
//! and an interaction rank that downstream filtering and the engine's
//! continue-on-failure policy both key off.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of browser action kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Navigate,
    #[serde(rename = "click")]
    Click,
    #[serde(rename = "dblclick")]
    DblClick,
    #[serde(rename = "rightclick")]
    RightClick,
    Input,
    Keypress,
    Scroll,
    Hover,
    Focus,
    Blur,
    Select,
    Copy,
    Paste,
    Cut,
    Drag,
    Drop,
    MediaPlay,
    MediaPause,
    MediaSeek,
    // Reserved kinds: declared for forward compatibility, never produced by
    // the extraction paths.
    FileUpload,
    Submit,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::DblClick => "dblclick",
            Self::RightClick => "rightclick",
            Self::Input => "input",
            Self::Keypress => "keypress",
            Self::Scroll => "scroll",
            Self::Hover => "hover",
            Self::Focus => "focus",
            Self::Blur => "blur",
            Self::Select => "select",
            Self::Copy => "copy",
            Self::Paste => "paste",
            Self::Cut => "cut",
            Self::Drag => "drag",
            Self::Drop => "drop",
            Self::MediaPlay => "media_play",
            Self::MediaPause => "media_pause",
            Self::MediaSeek => "media_seek",
            Self::FileUpload => "file_upload",
            Self::Submit => "submit",
        }
    }

    /// True for the media kinds the post-processing filter always drops.
    pub fn is_media(&self) -> bool {
        matches!(self, Self::MediaPlay | Self::MediaPause | Self::MediaSeek)
    }

    /// True for user interactions that typically cause consequential
    /// navigations.
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            Self::Click
                | Self::DblClick
                | Self::Input
                | Self::Keypress
                | Self::Submit
                | Self::Focus
                | Self::Blur
        )
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence that an element is meaningfully interactive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InteractionRank {
    High,
    Medium,
    Low,
}

/// The target element of an action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionTarget {
    #[serde(default)]
    pub tag: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub selector: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub node_id: i64,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl ActionTarget {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// A processed, meaningful browser action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticAction {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub workflow_id: String,
    pub sequence_id: u32,
    pub action_type: ActionType,
    #[serde(default)]
    pub target: ActionTarget,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    pub interaction_rank: InteractionRank,
    /// Interactable elements that appeared between the previous action and
    /// this one. Carried through extraction, stripped before persistence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<ActionTarget>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,
    pub timestamp: i64,
}

impl SemanticAction {
    pub fn new(action_type: ActionType, timestamp: i64) -> Self {
        Self {
            id: String::new(),
            workflow_id: String::new(),
            sequence_id: 0,
            action_type,
            target: ActionTarget::default(),
            value: String::new(),
            interaction_rank: InteractionRank::Low,
            context: Vec::new(),
            metadata: serde_json::Map::new(),
            timestamp,
        }
    }

    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// Truncate to at most `max_len` bytes on a char boundary.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
