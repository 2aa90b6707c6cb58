//! # Partial-JSON Assembly
//!
//! Turns an ordered stream of text deltas into a lazy sequence of
//! progressively more complete JSON values.
//!
//! The assembler keeps one growing buffer and re-parses the *whole* buffer
//! after every non-empty delta:
//!
//! - parse succeeds: the value is emitted (later emissions fully supersede
//!   earlier ones, nothing is diffed or patched),
//! - parse fails: nothing is emitted and nothing is raised; the buffer is
//!   usually mid-token or mid-structure and the next delta may complete it.
//!
//! At end of stream one final parse decides the [`StreamOutcome`]. Failed
//! parses are discarded, never partially trusted, so a structurally invalid
//! prefix can not leak into a result. The price is quadratic parsing work
//! over the length of one response.
//!
//! A markdown code fence around the document is ignored, as it is for
//! single-shot payloads, so an opening fence does not hold back partials.
//!
//! Partials are monotonic in buffer growth, not per field: a backend that
//! emits a field and later retracts it is trusted as-is.

use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use futures_util::{Stream, StreamExt};
use serde_json::Value;

use crate::backend::{strip_code_fence, BackendError, ChunkStream};
use crate::intent::Intent;
use crate::result::{IntentResult, PartialResult};
use crate::schema_registry::{schema_of, validate_against_schema, SchemaValidationError};

/// Buffer-and-reparse state machine, independent of any async source.
#[derive(Debug, Default)]
pub struct PartialJsonAssembler {
    buffer: String,
    last_emitted: Option<Value>,
    emitted: u64,
}

/// Result of the end-of-stream parse.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalParse {
    pub value: Value,
    /// The value equals the most recent emission and need not be re-emitted.
    pub already_emitted: bool,
}

impl PartialJsonAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `delta` and returns a value when the buffer parses to
    /// something different from the previous emission.
    pub fn push(&mut self, delta: &str) -> Option<Value> {
        if delta.is_empty() {
            return None;
        }
        self.buffer.push_str(delta);

        let value = self.parse()?;
        if self.last_emitted.as_ref() == Some(&value) {
            return None;
        }
        self.emitted += 1;
        self.last_emitted = Some(value.clone());
        Some(value)
    }

    /// Final parse attempt over the whole buffer.
    pub fn finish(&self) -> Option<TerminalParse> {
        let value = self.parse()?;
        let already_emitted = self.last_emitted.as_ref() == Some(&value);
        Some(TerminalParse {
            value,
            already_emitted,
        })
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Parses the buffer, ignoring a markdown fence around the document.
    fn parse(&self) -> Option<Value> {
        serde_json::from_str::<Value>(strip_code_fence(&self.buffer)).ok()
    }

    /// Number of values returned by [`push`](Self::push) so far.
    pub const fn emitted(&self) -> u64 {
        self.emitted
    }
}

/// How a streamed intent ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The full buffer parsed and satisfied the intent's schema.
    Complete,
    /// End of stream reached without a parseable document.
    Incomplete { buffered_bytes: usize },
    /// The terminal document parsed but violates the intent's schema.
    Rejected(SchemaValidationError),
    /// The upstream failed mid-stream and the buffer never completed.
    Interrupted(BackendError),
}

impl StreamOutcome {
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Complete => "stream.complete",
            Self::Incomplete { .. } => "stream.incomplete",
            Self::Rejected(_) => "stream.rejected",
            Self::Interrupted(_) => "stream.interrupted",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Complete => String::from("stream completed with a valid terminal result"),
            Self::Incomplete { buffered_bytes } => format!(
                "stream ended without a valid JSON document ({buffered_bytes} bytes buffered)"
            ),
            Self::Rejected(violation) => {
                format!("terminal document violates the output schema: {violation}")
            }
            Self::Interrupted(error) => format!("stream interrupted: {error}"),
        }
    }
}

/// Everything a drained [`IntentStream`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSummary {
    pub partials: Vec<PartialResult>,
    /// Present only when the outcome is [`StreamOutcome::Complete`].
    pub terminal: Option<IntentResult>,
    pub outcome: StreamOutcome,
}

/// Stream of [`PartialResult`]s for one streamed intent.
///
/// Never yields an error: terminal failures are logged and exposed through
/// [`outcome`](Self::outcome) once the stream is exhausted. When the outcome
/// is `Complete` the last item yielded is the authoritative result.
/// Dropping the stream drops the upstream connection.
pub struct IntentStream {
    intent: Intent,
    schema: &'static Value,
    source: String,
    chunks: Option<ChunkStream>,
    assembler: PartialJsonAssembler,
    outcome: Option<StreamOutcome>,
}

impl IntentStream {
    /// Wraps a chunk source for `intent`.
    pub fn from_chunks(intent: Intent, chunks: ChunkStream) -> Self {
        Self {
            intent,
            schema: schema_of(intent),
            source: String::from("stream"),
            chunks: Some(chunks),
            assembler: PartialJsonAssembler::new(),
            outcome: None,
        }
    }

    /// Names the producing backend in diagnostics.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub const fn intent(&self) -> Intent {
        self.intent
    }

    /// `None` until the stream has been exhausted.
    pub fn outcome(&self) -> Option<&StreamOutcome> {
        self.outcome.as_ref()
    }

    /// Consumes the stream to its end.
    pub async fn drain(mut self) -> StreamSummary {
        let mut partials = Vec::new();
        while let Some(partial) = self.next().await {
            partials.push(partial);
        }

        let outcome = self
            .outcome
            .take()
            .unwrap_or(StreamOutcome::Incomplete { buffered_bytes: 0 });
        let terminal = match (&outcome, partials.last()) {
            (StreamOutcome::Complete, Some(last)) => Some(last.clone().into_result()),
            _ => None,
        };

        StreamSummary {
            partials,
            terminal,
            outcome,
        }
    }

    fn partial(&self, value: Value) -> PartialResult {
        PartialResult {
            intent: self.intent,
            sequence: self.assembler.emitted(),
            value,
        }
    }

    fn conclude(&mut self, interruption: Option<BackendError>) -> Option<PartialResult> {
        self.chunks = None;

        let (outcome, emission) = match self.assembler.finish() {
            Some(terminal) => {
                let outcome = match validate_against_schema(&terminal.value, self.schema) {
                    Ok(()) => StreamOutcome::Complete,
                    Err(violation) => StreamOutcome::Rejected(violation),
                };
                let emission = if terminal.already_emitted {
                    None
                } else {
                    self.assembler.emitted += 1;
                    Some(self.partial(terminal.value))
                };
                (outcome, emission)
            }
            None => match interruption.clone() {
                Some(error) => (StreamOutcome::Interrupted(error), None),
                None => (
                    StreamOutcome::Incomplete {
                        buffered_bytes: self.assembler.buffer().len(),
                    },
                    None,
                ),
            },
        };

        if outcome.is_complete() {
            if let Some(error) = interruption {
                tracing::debug!(
                    intent = %self.intent,
                    source = %self.source,
                    %error,
                    "stream interrupted after the document completed"
                );
            }
            tracing::debug!(
                intent = %self.intent,
                source = %self.source,
                partials = self.assembler.emitted(),
                "stream complete"
            );
        } else {
            tracing::warn!(
                intent = %self.intent,
                source = %self.source,
                outcome = outcome.code(),
                partials = self.assembler.emitted(),
                "{}",
                outcome.describe()
            );
        }

        self.outcome = Some(outcome);
        emission
    }
}

impl Stream for IntentStream {
    type Item = PartialResult;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let Some(chunks) = this.chunks.as_mut() else {
                return Poll::Ready(None);
            };

            match chunks.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(delta))) => {
                    if let Some(value) = this.assembler.push(&delta) {
                        return Poll::Ready(Some(this.partial(value)));
                    }
                }
                Poll::Ready(Some(Err(error))) => return Poll::Ready(this.conclude(Some(error))),
                Poll::Ready(None) => return Poll::Ready(this.conclude(None)),
            }
        }
    }
}

impl Drop for IntentStream {
    fn drop(&mut self) {
        if self.chunks.is_some() {
            tracing::debug!(
                intent = %self.intent,
                source = %self.source,
                partials = self.assembler.emitted(),
                "stream dropped before completion, releasing connection"
            );
        }
    }
}

impl std::fmt::Debug for IntentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentStream")
            .field("intent", &self.intent)
            .field("source", &self.source)
            .field("open", &self.chunks.is_some())
            .field("emitted", &self.assembler.emitted())
            .field("outcome", &self.outcome)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::json;

    fn chunks(parts: &[&str]) -> ChunkStream {
        let owned: Vec<Result<String, BackendError>> =
            parts.iter().map(|part| Ok(part.to_string())).collect();
        Box::pin(stream::iter(owned))
    }

    #[test]
    fn push_emits_only_on_successful_parse() {
        let mut assembler = PartialJsonAssembler::new();
        assert_eq!(assembler.push("{\"a\":"), None);
        assert_eq!(assembler.push(""), None);
        assert_eq!(assembler.push("1}"), Some(json!({ "a": 1 })));
        assert_eq!(assembler.emitted(), 1);
    }

    #[test]
    fn push_suppresses_identical_reparse() {
        let mut assembler = PartialJsonAssembler::new();
        assert!(assembler.push("{\"a\":1}").is_some());
        assert_eq!(assembler.push("  \n"), None);
        let terminal = assembler.finish().expect("terminal");
        assert!(terminal.already_emitted);
    }

    #[test]
    fn code_fence_is_ignored_while_streaming_and_at_finish() {
        let mut assembler = PartialJsonAssembler::new();
        assert_eq!(assembler.push("```json\n{\"a\":"), None);
        assert_eq!(assembler.push("1}"), Some(json!({ "a": 1 })));
        assert_eq!(assembler.push("\n```"), None);
        let terminal = assembler.finish().expect("fenced terminal");
        assert_eq!(terminal.value, json!({ "a": 1 }));
        assert!(terminal.already_emitted);
    }

    #[test]
    fn trailing_garbage_fails_final_parse() {
        let mut assembler = PartialJsonAssembler::new();
        assert!(assembler.push("{\"a\":1}").is_some());
        assert_eq!(assembler.push("oops"), None);
        assert!(assembler.finish().is_none());
    }

    #[tokio::test]
    async fn summary_scenario_emits_single_terminal_partial() {
        let stream = IntentStream::from_chunks(
            Intent::Summarize,
            chunks(&[
                r#"{"sum"#,
                r#"mary":"Spending ro"#,
                r#"se 25%","keyPoints":["Feb up from Jan"],"confidence":0.9}"#,
            ]),
        );

        let summary = stream.drain().await;

        assert_eq!(summary.outcome, StreamOutcome::Complete);
        assert_eq!(summary.partials.len(), 1);
        assert_eq!(summary.partials[0].sequence, 1);
        let terminal = summary.terminal.expect("terminal result");
        assert_eq!(terminal.confidence(), Some(0.9));
        assert_eq!(terminal.value["summary"], "Spending rose 25%");
    }

    #[tokio::test]
    async fn empty_stream_reports_incomplete_without_partials() {
        let mut stream = IntentStream::from_chunks(Intent::Forecast, chunks(&[]));
        assert!(stream.outcome().is_none());
        assert!(stream.next().await.is_none());
        assert_eq!(
            stream.outcome(),
            Some(&StreamOutcome::Incomplete { buffered_bytes: 0 })
        );
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn schema_violation_is_rejected_but_still_delivered() {
        let stream = IntentStream::from_chunks(
            Intent::Summarize,
            chunks(&[r#"{"summary":"only"}"#]),
        );
        let summary = stream.drain().await;
        assert_eq!(summary.partials.len(), 1);
        assert!(summary.terminal.is_none());
        assert!(matches!(summary.outcome, StreamOutcome::Rejected(ref v) if v.path == "$/keyPoints"));
    }

    #[tokio::test]
    async fn transport_error_after_partial_document_interrupts() {
        let parts: Vec<Result<String, BackendError>> = vec![
            Ok(String::from("{\"summary\":")),
            Err(BackendError::transport("test", "connection reset")),
            Ok(String::from("\"never seen\"}")),
        ];
        let stream = IntentStream::from_chunks(Intent::Summarize, Box::pin(stream::iter(parts)));
        let summary = stream.drain().await;

        assert!(summary.partials.is_empty());
        assert!(matches!(summary.outcome, StreamOutcome::Interrupted(_)));
    }
}
