//! # NDJSON Intent Streaming
//!
//! Streams a running intent as newline-delimited JSON events.
//!
//! ## Event Types
//!
//! | Event | Description |
//! |-------|-------------|
//! | `start` | Run initiated, carries [`RunMetadata`](crate::RunMetadata) |
//! | `partial` | Progressively more complete result |
//! | `result` | Terminal, schema-valid result |
//! | `incomplete` | Stream ended without a valid result |
//! | `error` | Backend failure |
//!
//! Every stream has exactly one terminal event (`result`, `incomplete` or
//! `error`) and it is always the last line.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ferrosight_agent::{relay_intent_stream, NdjsonStreamWriter};
//!
//! let mut writer = NdjsonStreamWriter::new(std::io::stdout().lock());
//! writer.emit_start(Some(serde_json::to_value(&metadata)?))?;
//! let outcome = relay_intent_stream(stream, &mut writer).await?;
//! ```

use std::io::Write;

use ferrosight_core::{BackendError, IntentStream, PartialResult, StreamOutcome};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::OffsetDateTime;

/// Type of stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEventType {
    Start,
    Partial,
    Result,
    Incomplete,
    Error,
}

impl StreamEventType {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Result | Self::Incomplete | Self::Error)
    }
}

/// Error payload for `error` and `incomplete` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEventError {
    /// Machine-readable code, e.g. `backend.rate_limited`.
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl StreamEventError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: None,
        }
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    pub fn from_backend(error: &BackendError) -> Self {
        Self::new(error.code(), error.to_string()).with_retryable(error.retryable())
    }
}

/// A single stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub event: StreamEventType,
    /// Sequence number, starting from 1.
    pub seq: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StreamEventError>,
}

/// Writer for NDJSON stream events.
///
/// Each event is flushed as soon as it is written. Not thread-safe; use one
/// writer per run.
pub struct NdjsonStreamWriter<W: Write> {
    writer: W,
    next_seq: u64,
}

impl<W: Write> NdjsonStreamWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            next_seq: 1,
        }
    }

    pub fn emit_start(&mut self, data: Option<Value>) -> Result<(), StreamError> {
        self.emit(StreamEventType::Start, data, None)
    }

    pub fn emit_partial(&mut self, partial: &PartialResult) -> Result<(), StreamError> {
        let data = json!({
            "intent": partial.intent,
            "sequence": partial.sequence,
            "value": partial.value,
        });
        self.emit(StreamEventType::Partial, Some(data), None)
    }

    pub fn emit_result(&mut self, data: Option<Value>) -> Result<(), StreamError> {
        self.emit(StreamEventType::Result, data, None)
    }

    pub fn emit_incomplete(
        &mut self,
        error: StreamEventError,
        data: Option<Value>,
    ) -> Result<(), StreamError> {
        self.emit(StreamEventType::Incomplete, data, Some(error))
    }

    pub fn emit_error(
        &mut self,
        error: StreamEventError,
        data: Option<Value>,
    ) -> Result<(), StreamError> {
        self.emit(StreamEventType::Error, data, Some(error))
    }

    /// Sequence number the next event will carry.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(
        &mut self,
        event: StreamEventType,
        data: Option<Value>,
        error: Option<StreamEventError>,
    ) -> Result<(), StreamError> {
        let event = StreamEvent {
            event,
            seq: self.next_seq,
            ts: OffsetDateTime::now_utc(),
            data,
            error,
        };
        self.next_seq += 1;

        let payload = serde_json::to_string(&event)?;
        self.writer.write_all(payload.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Error type for stream operations.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes every partial of `stream`, then exactly one terminal event.
///
/// The final `partial` of a complete stream is repeated as the `result`
/// event. Returns how the stream ended.
pub async fn relay_intent_stream<W: Write>(
    mut stream: IntentStream,
    writer: &mut NdjsonStreamWriter<W>,
) -> Result<StreamOutcome, StreamError> {
    let intent = stream.intent();
    let mut last: Option<PartialResult> = None;

    while let Some(partial) = stream.next().await {
        writer.emit_partial(&partial)?;
        last = Some(partial);
    }

    let outcome = stream
        .outcome()
        .cloned()
        .unwrap_or(StreamOutcome::Incomplete { buffered_bytes: 0 });

    match (&outcome, last) {
        (StreamOutcome::Complete, Some(terminal)) => {
            let data = json!({
                "intent": intent,
                "value": terminal.value,
                "partials": terminal.sequence,
            });
            writer.emit_result(Some(data))?;
        }
        (StreamOutcome::Interrupted(error), last) => {
            let data = last.map(|partial| json!({ "lastPartial": partial.value }));
            writer.emit_error(StreamEventError::from_backend(error), data)?;
        }
        (other, last) => {
            let mut data = json!({ "intent": intent });
            if let StreamOutcome::Incomplete { buffered_bytes } = other {
                data["bufferedBytes"] = json!(buffered_bytes);
            }
            if let Some(partial) = last {
                data["lastPartial"] = partial.value;
            }
            writer.emit_incomplete(
                StreamEventError::new(other.code(), other.describe()).with_retryable(false),
                Some(data),
            )?;
        }
    }

    Ok(outcome)
}

/// Parses NDJSON lines into stream events.
pub fn parse_stream_events(input: &str) -> Result<Vec<StreamEvent>, serde_json::Error> {
    input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}

/// Validates that a stream is well-formed.
///
/// Checks that sequence numbers start at 1 and strictly increase, that
/// `error`/`incomplete` events carry an error payload and that nothing
/// follows the terminal event. Returns the event count.
pub fn validate_stream(input: &str) -> Result<usize, StreamValidationError> {
    let mut count = 0;
    let mut previous_seq = 0;
    let mut terminated = false;

    for (line_num, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_number = line_num + 1;
        let invalid = |message: &str| StreamValidationError {
            line_number,
            message: message.to_string(),
        };

        let event: StreamEvent = serde_json::from_str(line).map_err(|e| StreamValidationError {
            line_number,
            message: e.to_string(),
        })?;

        if event.seq == 0 {
            return Err(invalid("sequence number must be >= 1"));
        }
        if event.seq <= previous_seq {
            return Err(invalid("sequence numbers must strictly increase"));
        }
        if terminated {
            return Err(invalid("no event may follow the terminal event"));
        }
        if matches!(event.event, StreamEventType::Error | StreamEventType::Incomplete)
            && event.error.is_none()
        {
            return Err(invalid("error and incomplete events must have error payload"));
        }

        previous_seq = event.seq;
        terminated = event.event.is_terminal();
        count += 1;
    }
    Ok(count)
}

/// Error from stream validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stream validation error at line {line_number}: {message}")]
pub struct StreamValidationError {
    /// 1-based line number.
    pub line_number: usize,
    pub message: String,
}
