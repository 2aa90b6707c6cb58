//! Backend adapter contract.
//!
//! A backend is anything that can turn a fully-resolved
//! [`GenerationRequest`] into text, either in one round trip or as a stream
//! of text deltas. Intent-level semantics (prompt and schema resolution,
//! payload parsing, validation, stream assembly) are layered on top by
//! [`IntentExecutor`], which every [`Backend`] gets for free.
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`name`](Backend::name) | Backend identifier used in logs and errors |
//! | [`defaults`](Backend::defaults) | Generation settings fixed at construction |
//! | [`generate`](Backend::generate) | Single schema-constrained round trip |
//! | [`generate_stream`](Backend::generate_stream) | Incremental text deltas |
//!
//! # Example Implementation
//!
//! ```rust,ignore
//! use ferrosight_core::{Backend, BackendFuture, ChunkStream, GenerationDefaults, GenerationRequest};
//!
//! struct EchoBackend {
//!     defaults: GenerationDefaults,
//! }
//!
//! impl Backend for EchoBackend {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn defaults(&self) -> &GenerationDefaults {
//!         &self.defaults
//!     }
//!
//!     fn generate<'a>(&'a self, _request: GenerationRequest) -> BackendFuture<'a, String> {
//!         Box::pin(async move { Ok(String::from(r#"{"summary":"ok","keyPoints":[],"confidence":1}"#)) })
//!     }
//!
//!     // ...
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;
use serde_json::Value;

use crate::assembler::IntentStream;
use crate::context::Context;
use crate::error::IntentError;
use crate::intent::{Intent, IntentKey};
use crate::options::{GenerationDefaults, RequestOptions};
use crate::prompt::build_prompt;
use crate::result::IntentResult;
use crate::schema_registry::{schema_for, validate_against_schema};

/// Boxed future returned by backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// Ordered text deltas from a streaming generation. Dropping the stream
/// releases the underlying connection.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

/// Boxed future returned by intent-level operations.
pub type IntentFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, IntentError>> + Send + 'a>>;

/// Backend-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Connection, DNS, TLS or timeout failure.
    Transport,
    /// Credentials rejected (401/403).
    Auth,
    /// Quota or rate limit hit (429).
    RateLimited,
    /// Any other non-success status or vendor-reported error.
    Upstream,
    /// Call succeeded but carried no text.
    EmptyPayload,
    /// Vendor envelope could not be decoded.
    Protocol,
}

/// Structured backend failure with the underlying cause preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    kind: BackendErrorKind,
    backend: String,
    message: String,
    status: Option<u16>,
}

impl BackendError {
    fn new(kind: BackendErrorKind, backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            backend: backend.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn transport(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transport, backend, message)
    }

    pub fn rate_limited(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::RateLimited, backend, message).with_status(429)
    }

    pub fn upstream(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Upstream, backend, message)
    }

    pub fn empty_payload(backend: impl Into<String>) -> Self {
        Self::new(
            BackendErrorKind::EmptyPayload,
            backend,
            "backend returned no text payload",
        )
    }

    pub fn protocol(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Protocol, backend, message)
    }

    /// Classifies a non-success HTTP status. A vendor `error.message` in the
    /// body is preferred over the raw body text.
    pub fn from_status(backend: impl Into<String>, status: u16, body: &str) -> Self {
        let detail = vendor_error_message(body).unwrap_or_else(|| truncate(body.trim(), 512));
        let message = format!("upstream returned status {status}: {detail}");
        let kind = match status {
            401 | 403 => BackendErrorKind::Auth,
            429 => BackendErrorKind::RateLimited,
            _ => BackendErrorKind::Upstream,
        };
        Self::new(kind, backend, message).with_status(status)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub const fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn retryable(&self) -> bool {
        match self.kind {
            BackendErrorKind::Transport | BackendErrorKind::RateLimited => true,
            BackendErrorKind::Upstream => self.status.is_some_and(|status| status >= 500),
            BackendErrorKind::Auth | BackendErrorKind::EmptyPayload | BackendErrorKind::Protocol => {
                false
            }
        }
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            BackendErrorKind::Transport => "backend.transport",
            BackendErrorKind::Auth => "backend.auth",
            BackendErrorKind::RateLimited => "backend.rate_limited",
            BackendErrorKind::Upstream => "backend.upstream",
            BackendErrorKind::EmptyPayload => "backend.empty_payload",
            BackendErrorKind::Protocol => "backend.protocol",
        }
    }
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.backend, self.message, self.code())
    }
}

impl std::error::Error for BackendError {}

fn vendor_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Fully-resolved request handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub intent: Intent,
    pub prompt: String,
    pub schema: &'static Value,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationRequest {
    /// Resolves prompt, schema and effective options. Performs no I/O.
    pub fn resolve(
        key: impl IntentKey,
        context: &Context,
        options: &RequestOptions,
        defaults: &GenerationDefaults,
    ) -> Result<Self, IntentError> {
        let intent = key.resolve()?;
        options.validate()?;
        let prompt = build_prompt(intent, context)?;
        let schema = schema_for(intent)?;
        let effective = options.resolve(defaults);

        Ok(Self {
            intent,
            prompt,
            schema,
            model: effective.model,
            system_prompt: effective.system_prompt,
            temperature: effective.temperature,
            max_output_tokens: effective.max_output_tokens,
        })
    }
}

/// Backend adapter contract.
///
/// Implementations must be `Send + Sync`: one instance serves any number of
/// concurrent calls, each owning its own connection.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    fn defaults(&self) -> &GenerationDefaults;

    /// Issues exactly one schema-constrained call and returns its text payload.
    fn generate<'a>(&'a self, request: GenerationRequest) -> BackendFuture<'a, String>;

    /// Opens a streaming call. Connection failures and non-success statuses
    /// are reported here; failures after the first byte arrive as stream items.
    fn generate_stream<'a>(&'a self, request: GenerationRequest) -> BackendFuture<'a, ChunkStream>;
}

/// Intent-level operations available on every [`Backend`].
///
/// Both operations resolve the intent, options, prompt and schema before
/// touching the backend, so an unknown intent never costs a round trip.
pub trait IntentExecutor {
    fn execute_intent<'a>(
        &'a self,
        key: impl IntentKey,
        context: &Context,
        options: &RequestOptions,
    ) -> IntentFuture<'a, IntentResult>;

    fn stream_intent<'a>(
        &'a self,
        key: impl IntentKey,
        context: &Context,
        options: &RequestOptions,
    ) -> IntentFuture<'a, IntentStream>;
}

impl<B: Backend + ?Sized> IntentExecutor for B {
    fn execute_intent<'a>(
        &'a self,
        key: impl IntentKey,
        context: &Context,
        options: &RequestOptions,
    ) -> IntentFuture<'a, IntentResult> {
        let request = match GenerationRequest::resolve(key, context, options, self.defaults()) {
            Ok(request) => request,
            Err(error) => return Box::pin(std::future::ready(Err(error))),
        };

        Box::pin(async move {
            let intent = request.intent;
            let schema = request.schema;
            let payload = self.generate(request).await?;
            parse_payload(self.name(), intent, schema, &payload)
        })
    }

    fn stream_intent<'a>(
        &'a self,
        key: impl IntentKey,
        context: &Context,
        options: &RequestOptions,
    ) -> IntentFuture<'a, IntentStream> {
        let request = match GenerationRequest::resolve(key, context, options, self.defaults()) {
            Ok(request) => request,
            Err(error) => return Box::pin(std::future::ready(Err(error))),
        };

        Box::pin(async move {
            let intent = request.intent;
            let chunks = self.generate_stream(request).await?;
            Ok(IntentStream::from_chunks(intent, chunks).with_source(self.name()))
        })
    }
}

/// Parses a single-shot payload into a validated result.
pub fn parse_payload(
    backend: &str,
    intent: Intent,
    schema: &Value,
    payload: &str,
) -> Result<IntentResult, IntentError> {
    let body = strip_code_fence(payload);
    if body.is_empty() {
        return Err(BackendError::empty_payload(backend).into());
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|error| IntentError::malformed(format!("payload is not valid JSON: {error}"), payload))?;

    validate_against_schema(&value, schema).map_err(|violation| {
        IntentError::malformed(format!("payload violates {intent} schema at {violation}"), payload)
    })?;

    Ok(IntentResult::new(intent, value))
}

/// Removes a surrounding markdown code fence, which some models emit even
/// when asked for bare JSON. Shared by single-shot and streamed parsing so
/// both accept the same payloads.
pub(crate) fn strip_code_fence(payload: &str) -> &str {
    let trimmed = payload.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_mapping_classifies_common_failures() {
        assert_eq!(
            BackendError::from_status("gemini", 401, "").kind(),
            BackendErrorKind::Auth
        );
        assert_eq!(
            BackendError::from_status("gemini", 429, "").kind(),
            BackendErrorKind::RateLimited
        );
        let server = BackendError::from_status("gemini", 503, "unavailable");
        assert_eq!(server.kind(), BackendErrorKind::Upstream);
        assert!(server.retryable());
        assert!(!BackendError::from_status("gemini", 400, "bad").retryable());
    }

    #[test]
    fn status_mapping_prefers_vendor_message() {
        let error = BackendError::from_status(
            "openai",
            400,
            r#"{"error":{"message":"model not found","type":"invalid_request_error"}}"#,
        );
        assert!(error.message().contains("model not found"));
        assert_eq!(error.status(), Some(400));
    }

    #[test]
    fn strip_code_fence_handles_tagged_and_bare_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn parse_payload_validates_against_schema() {
        let schema = schema_for(Intent::Summarize).expect("schema");
        let ok = parse_payload(
            "test",
            Intent::Summarize,
            schema,
            r#"{"summary":"up","keyPoints":["a"],"confidence":0.5}"#,
        )
        .expect("valid payload");
        assert_eq!(ok.value, json!({ "summary": "up", "keyPoints": ["a"], "confidence": 0.5 }));

        let missing = parse_payload("test", Intent::Summarize, schema, r#"{"summary":"up"}"#);
        assert!(matches!(missing, Err(IntentError::MalformedResponse { .. })));
    }

    #[test]
    fn parse_payload_reports_blank_payload_as_backend_error() {
        let schema = schema_for(Intent::Summarize).expect("schema");
        let error = parse_payload("test", Intent::Summarize, schema, "   ").expect_err("blank");
        assert!(matches!(
            error,
            IntentError::Backend(ref cause) if cause.kind() == BackendErrorKind::EmptyPayload
        ));
    }

    #[test]
    fn resolve_fails_fast_on_unknown_intent() {
        let error = GenerationRequest::resolve(
            "FOO",
            &Context::default(),
            &RequestOptions::default(),
            &GenerationDefaults::new("model"),
        )
        .expect_err("unknown intent");
        assert!(matches!(error, IntentError::UnknownIntent { .. }));
    }
}
