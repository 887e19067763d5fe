//! Recording ingestion
//!
//! Parses an uploaded recording into a time-sorted hybrid event stream.
//! Individual unparseable events are skipped; only a structurally invalid
//! file aborts the upload.

use prost::Message;
use serde_json::Value;
use thiserror::Error;

use retrace_core::{
    EventSource, EventTarget, EventType, HybridEvent, KeyModifiers, MetaData,
    RecorderEventType,
};

use crate::proto::ProtoSession;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("recording is not a JSON event array: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("recording is not a valid binary session: {0}")]
    InvalidProto(#[from] prost::DecodeError),
    #[error("recording contains no parseable events")]
    Empty,
}

/// Parses hybrid recordings (JSON or protobuf) into sorted events.
#[derive(Debug, Default)]
pub struct RecordingParser {
    events: Vec<HybridEvent>,
}

impl RecordingParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of hybrid events. Unparseable elements are skipped.
    pub fn parse_json(&mut self, data: &[u8]) -> Result<(), ParseError> {
        let raw_events: Vec<Value> = serde_json::from_slice(data)?;

        for raw in raw_events {
            match serde_json::from_value::<HybridEvent>(raw) {
                Ok(event) => self.events.push(unwrap_recorder_envelope(event)),
                Err(error) => {
                    tracing::debug!(error = %error, "Skipping unparseable event");
                }
            }
        }

        self.sort_events();
        Ok(())
    }

    /// Parse a protobuf-encoded session.
    pub fn parse_proto(&mut self, data: &[u8]) -> Result<(), ParseError> {
        let session = ProtoSession::decode(data)?;

        for proto_event in session.events {
            let source = match proto_event.source.as_str() {
                "recorder" | "rrweb" => EventSource::Recorder,
                "custom" => EventSource::Custom,
                other => {
                    tracing::debug!(source = other, "Skipping event with unknown source");
                    continue;
                }
            };

            // Recorder types are numeric on the wire but travel as decimal
            // strings in the proto schema.
            let event_type = match source {
                EventSource::Recorder => match proto_event.event_type.parse::<i64>() {
                    Ok(code) => EventType::Recorder(code),
                    Err(_) => EventType::Custom(proto_event.event_type.clone()),
                },
                EventSource::Custom => EventType::Custom(proto_event.event_type.clone()),
            };

            let data = if proto_event.data.is_empty() {
                None
            } else {
                serde_json::from_str::<Value>(&proto_event.data).ok()
            };

            let mut value = proto_event.value;
            if value.is_empty() && !proto_event.text.is_empty() {
                value = proto_event.text;
            }

            let event = HybridEvent {
                source,
                timestamp: proto_event.timestamp,
                event_type,
                data,
                target: proto_event.target.map(|target| EventTarget {
                    tag: target.tag,
                    selector: target.selector,
                    text: target.text,
                }),
                key: proto_event.key,
                modifiers: proto_event.modifiers.map(|modifiers| KeyModifiers {
                    alt: modifiers.alt,
                    ctrl: modifiers.ctrl,
                    meta: modifiers.meta,
                    shift: modifiers.shift,
                }),
                shortcut: proto_event.shortcut,
                value,
            };

            self.events.push(unwrap_recorder_envelope(event));
        }

        self.sort_events();
        Ok(())
    }

    fn sort_events(&mut self) {
        self.events.sort_by_key(|event| event.timestamp);
    }

    pub fn events(&self) -> &[HybridEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<HybridEvent> {
        self.events
    }

    /// The initial URL: the href of the first meta event in the recording.
    pub fn start_url(&self) -> Option<String> {
        for event in &self.events {
            if event.source != EventSource::Recorder {
                continue;
            }
            let Some(code) = event.event_type.as_recorder() else {
                continue;
            };
            if RecorderEventType::from_code(code) != Some(RecorderEventType::Meta) {
                continue;
            }
            if let Some(data) = &event.data {
                if let Ok(meta) = serde_json::from_value::<MetaData>(data.clone()) {
                    if !meta.href.is_empty() {
                        return Some(meta.href);
                    }
                }
            }
        }
        None
    }
}

/// Some recorder events wrap an inner `{type, data, timestamp}` envelope;
/// hoist it so downstream code sees a flat payload.
fn unwrap_recorder_envelope(mut event: HybridEvent) -> HybridEvent {
    if event.source != EventSource::Recorder {
        return event;
    }

    let Some(data) = &event.data else {
        return event;
    };

    let is_envelope = data.get("type").map(Value::is_i64).unwrap_or(false)
        && data.get("data").is_some()
        && data.get("timestamp").is_some();
    if !is_envelope {
        return event;
    }

    if let Some(inner_type) = data.get("type").and_then(Value::as_i64) {
        let inner_data = data.get("data").cloned();
        event.event_type = EventType::Recorder(inner_type);
        event.data = inner_data;
    }

    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    use crate::proto::{ProtoEvent, ProtoTarget};

    #[test]
    fn parses_and_sorts_json_events() {
        let data = br#"[
            {"source":"custom","timestamp":300,"type":"click"},
            {"source":"rrweb","timestamp":100,"type":4,"data":{"href":"https://x.test/","width":800,"height":600}},
            {"source":"rrweb","timestamp":200,"type":2,"data":{"node":{"id":1,"tagName":"html"}}}
        ]"#;
        let mut parser = RecordingParser::new();
        parser.parse_json(data).unwrap();

        let timestamps: Vec<i64> = parser.events().iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
        assert_eq!(parser.start_url().as_deref(), Some("https://x.test/"));
    }

    #[test]
    fn skips_unparseable_events() {
        let data = br#"[
            {"source":"rrweb","timestamp":100,"type":4,"data":{"href":"https://x.test/"}},
            {"bogus":true},
            42
        ]"#;
        let mut parser = RecordingParser::new();
        parser.parse_json(data).unwrap();
        assert_eq!(parser.events().len(), 1);
    }

    #[test]
    fn rejects_non_array_upload() {
        let mut parser = RecordingParser::new();
        assert!(parser.parse_json(b"{\"not\":\"an array\"}").is_err());
        assert!(parser.parse_json(b"garbage").is_err());
    }

    #[test]
    fn unwraps_nested_recorder_envelope() {
        let data = br#"[
            {"source":"rrweb","timestamp":100,"type":0,"data":{"type":4,"timestamp":100,"data":{"href":"https://y.test/"}}}
        ]"#;
        let mut parser = RecordingParser::new();
        parser.parse_json(data).unwrap();

        let event = &parser.events()[0];
        assert_eq!(event.event_type.as_recorder(), Some(4));
        assert_eq!(parser.start_url().as_deref(), Some("https://y.test/"));
    }

    #[test]
    fn parses_proto_session_with_type_coercion() {
        let session = ProtoSession {
            events: vec![
                ProtoEvent {
                    source: "rrweb".to_string(),
                    event_type: "4".to_string(),
                    timestamp: 50,
                    data: r#"{"href":"https://p.test/"}"#.to_string(),
                    ..Default::default()
                },
                ProtoEvent {
                    source: "custom".to_string(),
                    event_type: "copy".to_string(),
                    timestamp: 80,
                    text: "copied text".to_string(),
                    target: Some(ProtoTarget {
                        tag: "p".to_string(),
                        selector: ".para".to_string(),
                        text: String::new(),
                    }),
                    ..Default::default()
                },
            ],
        };

        let mut parser = RecordingParser::new();
        parser.parse_proto(&session.encode_to_vec()).unwrap();

        assert_eq!(parser.events().len(), 2);
        assert_eq!(parser.events()[0].event_type.as_recorder(), Some(4));
        // The proto text field backfills an empty value.
        assert_eq!(parser.events()[1].value, "copied text");
        assert_eq!(parser.start_url().as_deref(), Some("https://p.test/"));
    }
}
