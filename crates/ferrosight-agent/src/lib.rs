//! # ferrosight-agent
//!
//! Agent-facing primitives for ferrosight: NDJSON intent streaming and run metadata.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`stream`] | NDJSON event writer, intent stream relay and validation |
//! | [`metadata`] | Request ids and per-run metadata |
//!
//! ## Features
//!
//! - **NDJSON streaming**: `start`, `partial`, `result`, `incomplete` and `error` events with sequence numbers
//! - **Single terminal event**: every relayed stream ends with exactly one terminal line
//! - **Machine metadata**: request_id, intent, backend, model, latency_ms, warnings
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrosight_agent::{relay_intent_stream, NdjsonStreamWriter, RunMetadata};
//!
//! let metadata = RunMetadata::new(intent, backend.name(), &model).streamed();
//! let mut writer = NdjsonStreamWriter::new(std::io::stdout().lock());
//! writer.emit_start(Some(serde_json::to_value(&metadata)?))?;
//!
//! let stream = runner.stream(intent, &context, None).await?;
//! let outcome = relay_intent_stream(stream, &mut writer).await?;
//! ```

pub mod metadata;
pub mod stream;

pub use metadata::{MetadataError, RequestId, RunMetadata};
pub use stream::{
    parse_stream_events, relay_intent_stream, validate_stream, NdjsonStreamWriter, StreamError,
    StreamEvent, StreamEventError, StreamEventType, StreamValidationError,
};
