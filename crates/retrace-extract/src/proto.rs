//! Protobuf recording format
//!
//! Binary uploads are a `HybridSession` message with a repeated event field.
//! The messages are declared inline with prost derives; the wire schema
//! mirrors the JSON envelope, with the event type carried as a string (rrweb
//! numeric types arrive as decimal strings) and the payload as a JSON string.

use prost::Message;

#[derive(Clone, PartialEq, Message)]
pub struct ProtoSession {
    #[prost(message, repeated, tag = "1")]
    pub events: Vec<ProtoEvent>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoEvent {
    #[prost(string, tag = "1")]
    pub source: String,
    #[prost(string, tag = "2")]
    pub event_type: String,
    #[prost(int64, tag = "3")]
    pub timestamp: i64,
    #[prost(string, tag = "4")]
    pub data: String,
    #[prost(message, optional, tag = "5")]
    pub target: Option<ProtoTarget>,
    #[prost(string, tag = "6")]
    pub value: String,
    #[prost(string, tag = "7")]
    pub text: String,
    #[prost(string, tag = "8")]
    pub key: String,
    #[prost(message, optional, tag = "9")]
    pub modifiers: Option<ProtoModifiers>,
    #[prost(string, tag = "10")]
    pub shortcut: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoTarget {
    #[prost(string, tag = "1")]
    pub tag: String,
    #[prost(string, tag = "2")]
    pub selector: String,
    #[prost(string, tag = "3")]
    pub text: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoModifiers {
    #[prost(bool, tag = "1")]
    pub alt: bool,
    #[prost(bool, tag = "2")]
    pub ctrl: bool,
    #[prost(bool, tag = "3")]
    pub meta: bool,
    #[prost(bool, tag = "4")]
    pub shift: bool,
}
