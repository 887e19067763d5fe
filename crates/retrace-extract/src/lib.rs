//! Retrace extraction pipeline
//!
//! Lowers a raw recording (a hybrid stream of DOM snapshots, incremental
//! mutations, and user-level events) into a compact, parameter-aware sequence
//! of semantic actions with robust selectors.
//!
//! The pipeline has three stages:
//! 1. [`parser::RecordingParser`] ingests the upload (JSON array or protobuf
//!    session) into time-sorted hybrid events.
//! 2. [`extractor::Extractor`] rebuilds a DOM registry from the snapshot
//!    stream, emits semantic actions, and post-processes them (navigation
//!    dedup, input debounce, selector enrichment, tolerance filtering).
//! 3. [`params`] identifies which recorded input values are run-time
//!    parameters and names them.

pub mod extractor;
pub mod params;
pub mod parser;
pub mod proto;
pub mod registry;
pub mod selector;

pub use extractor::{Extractor, Tolerance};
pub use params::{ValueClassifier, identify_variables};
pub use parser::{ParseError, RecordingParser};
pub use registry::DomRegistry;
