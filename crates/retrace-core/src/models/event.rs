//! Hybrid event model
//!
//! One record in an uploaded recording. Events come from two sources: the DOM
//! recorder (numeric event types, nested snapshot/mutation payloads) and the
//! custom user-level instrumentation (string event types, explicit targets).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Origin of a hybrid event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// DOM-level events emitted by the session recorder.
    #[serde(alias = "rrweb")]
    Recorder,
    /// User-level events emitted by the custom instrumentation.
    Custom,
}

/// Event type discriminator: an integer for recorder events, a string for
/// custom events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EventType {
    Recorder(i64),
    Custom(String),
}

impl EventType {
    pub fn as_recorder(&self) -> Option<i64> {
        match self {
            Self::Recorder(code) => Some(*code),
            Self::Custom(_) => None,
        }
    }

    pub fn as_custom(&self) -> Option<&str> {
        match self {
            Self::Recorder(_) => None,
            Self::Custom(kind) => Some(kind.as_str()),
        }
    }
}

/// Keyboard modifier flags on custom key events.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyModifiers {
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
}

/// Target descriptor carried by custom events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventTarget {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub text: String,
}

/// A single record in the uploaded event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridEvent {
    pub source: EventSource,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub data: Option<Value>,
    // Custom-source fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<EventTarget>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<KeyModifiers>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shortcut: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}

/// Recorder event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderEventType {
    DomContentLoaded,
    Load,
    FullSnapshot,
    Incremental,
    Meta,
    Custom,
}

impl RecorderEventType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::DomContentLoaded),
            1 => Some(Self::Load),
            2 => Some(Self::FullSnapshot),
            3 => Some(Self::Incremental),
            4 => Some(Self::Meta),
            5 => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Incremental snapshot source sub-kinds.
pub mod incremental_source {
    pub const MUTATION: i64 = 0;
    pub const MOUSE_MOVE: i64 = 1;
    pub const MOUSE_INTERACTION: i64 = 2;
    pub const SCROLL: i64 = 3;
    pub const VIEWPORT_RESIZE: i64 = 4;
    pub const INPUT: i64 = 5;
    pub const TOUCH_MOVE: i64 = 6;
    pub const MEDIA_INTERACTION: i64 = 7;
    pub const DRAG: i64 = 12;
    pub const SELECTION: i64 = 14;
}

/// Mouse interaction sub-types (for `incremental_source::MOUSE_INTERACTION`).
pub mod mouse_interaction {
    pub const MOUSE_UP: i64 = 0;
    pub const MOUSE_DOWN: i64 = 1;
    pub const CLICK: i64 = 2;
    pub const CONTEXT_MENU: i64 = 3;
    pub const DBL_CLICK: i64 = 4;
    pub const FOCUS: i64 = 5;
    pub const BLUR: i64 = 6;
    pub const TOUCH_START: i64 = 7;
    pub const TOUCH_END: i64 = 9;
}

/// A serialized DOM node from a full snapshot or mutation-add.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerializedNode {
    pub id: i64,
    #[serde(default, rename = "type")]
    pub node_type: i64,
    #[serde(default, rename = "tagName")]
    pub tag_name: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
    #[serde(default, rename = "childNodes")]
    pub child_nodes: Vec<SerializedNode>,
    #[serde(default, rename = "textContent")]
    pub text_content: String,
}

/// Meta event payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaData {
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
}

/// A DOM node addition inside a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAddition {
    #[serde(default, rename = "parentId")]
    pub parent_id: i64,
    pub node: SerializedNode,
}

/// A DOM node removal inside a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRemoval {
    #[serde(default, rename = "parentId")]
    pub parent_id: i64,
    pub id: i64,
}

/// A text-content mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextMutation {
    pub id: i64,
    #[serde(default)]
    pub value: String,
}

/// An attribute mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeMutation {
    pub id: i64,
    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
}

/// Incremental snapshot payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncrementalData {
    pub source: i64,
    #[serde(default, rename = "type")]
    pub interaction_type: i64,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "isChecked")]
    pub is_checked: bool,
    #[serde(default)]
    pub adds: Vec<NodeAddition>,
    #[serde(default)]
    pub removes: Vec<NodeRemoval>,
    #[serde(default)]
    pub texts: Vec<TextMutation>,
    #[serde(default)]
    pub attributes: Vec<AttributeMutation>,
}

/// Media interaction payload (play / pause / seek).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaData {
    #[serde(default, rename = "type")]
    pub interaction_type: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_event_deserializes_numeric_type() {
        let raw = r#"{"source":"rrweb","timestamp":100,"type":4,"data":{"href":"https://x.test/"}}"#;
        let event: HybridEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.source, EventSource::Recorder);
        assert_eq!(event.event_type.as_recorder(), Some(4));
    }

    #[test]
    fn custom_event_deserializes_string_type() {
        let raw = r#"{"source":"custom","timestamp":200,"type":"click","target":{"tag":"button","selector":".btn","text":"Go"}}"#;
        let event: HybridEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.source, EventSource::Custom);
        assert_eq!(event.event_type.as_custom(), Some("click"));
        assert_eq!(event.target.unwrap().tag, "button");
    }

    #[test]
    fn serialized_node_tree_roundtrips() {
        let raw = r#"{"id":1,"type":2,"tagName":"button","attributes":{"id":"submit"},"childNodes":[{"id":2,"type":3,"textContent":"Send"}]}"#;
        let node: SerializedNode = serde_json::from_str(raw).unwrap();
        assert_eq!(node.tag_name, "button");
        assert_eq!(node.child_nodes.len(), 1);
        assert_eq!(node.child_nodes[0].text_content, "Send");
    }
}
