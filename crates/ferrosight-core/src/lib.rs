//! # Ferrosight Core
//!
//! Intent execution and streaming assembly for schema-constrained language
//! model analysis of tabular data.
//!
//! ## Overview
//!
//! Callers name an analytical [`Intent`] (explain, forecast, detect
//! anomalies, ...), hand over a [`Context`] holding the dataset, and receive
//! a JSON [`IntentResult`] that has been validated against the intent's
//! schema. Streamed execution yields progressively more complete
//! [`PartialResult`]s while the backend is still generating.
//!
//! - **Closed intent catalog** with per-intent output schemas
//! - **Deterministic prompt construction** from intent and context
//! - **Backend contract** for single-shot and streamed generation
//! - **Partial-JSON assembly** of streamed text into monotonic partials
//! - **Gemini and OpenAI adapters** over an injectable HTTP transport
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Vendor adapters (Gemini, OpenAI) |
//! | [`assembler`] | Partial-JSON assembler and [`IntentStream`] |
//! | [`backend`] | Backend trait, request and error types |
//! | [`config`] | Environment-driven backend configuration |
//! | [`context`] | Dataset, selection and metadata input |
//! | [`domain`] | Typed per-intent result models |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`intent`] | Intent catalog |
//! | [`options`] | Per-call options and backend defaults |
//! | [`prompt`] | Prompt builder |
//! | [`runner`] | [`IntentRunner`] entry point |
//! | [`schema_registry`] | Output schemas and validation |
//! | [`sse`] | Server-sent events decoding |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrosight_core::{BackendConfig, Context, Intent, IntentRunner};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = BackendConfig::from_env()?.into_backend();
//!     let runner = IntentRunner::new(backend);
//!
//!     let context = Context::new(vec![
//!         json!({ "month": "Jan", "amount": 100 }),
//!         json!({ "month": "Feb", "amount": 125 }),
//!     ]);
//!     let result = runner.run(Intent::Summarize, &context, None).await?;
//!     println!("{}", result.value["summary"]);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Intent Runner  │────▶│ Prompt Builder   │
//! │                 │────▶│ Schema Registry  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Backend         │────▶│ HTTP Client      │
//! │ (Adapter Trait) │     │ (reqwest/script) │
//! └────────┬────────┘     └──────────────────┘
//!          │ text deltas
//!          ▼
//! ┌─────────────────┐
//! │ Partial-JSON    │
//! │ Assembler       │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Single-shot failures are returned as [`IntentError`]; streamed runs never
//! raise after the first byte and report how they ended through
//! [`StreamOutcome`]:
//!
//! ```rust
//! use ferrosight_core::{BackendErrorKind, IntentError};
//!
//! fn handle_error(error: IntentError) {
//!     match error {
//!         IntentError::Backend(cause) if cause.kind() == BackendErrorKind::RateLimited => {
//!             // Wait and retry
//!         }
//!         IntentError::UnknownIntent { .. } | IntentError::InvalidOptions(_) => {
//!             // Report to user
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - API keys are read from environment variables only (never logged)
//! - `Debug` output of adapters and configuration redacts credentials

pub mod adapters;
pub mod assembler;
pub mod backend;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod intent;
pub mod options;
pub mod prompt;
pub mod result;
pub mod runner;
pub mod schema_registry;
pub mod sse;

// Adapter implementations
pub use adapters::{AdapterConfig, GeminiAdapter, OpenAiAdapter};

// Streaming assembly
pub use assembler::{IntentStream, PartialJsonAssembler, StreamOutcome, StreamSummary};

// Backend contract
pub use backend::{
    parse_payload, Backend, BackendError, BackendErrorKind, BackendFuture, ChunkStream,
    GenerationRequest, IntentExecutor, IntentFuture,
};

// Configuration
pub use config::{BackendConfig, Provider};

// Inputs
pub use context::{Context, ContextMeta};
pub use intent::{Intent, IntentKey};
pub use options::{GenerationDefaults, RequestOptions};

// Domain models
pub use domain::IntentOutput;

// Error types
pub use error::{ConfigError, IntentError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse,
    ReqwestHttpClient, ScriptedHttpClient, ScriptedReply,
};

// Prompt and schemas
pub use prompt::{build_prompt, DEFAULT_SYSTEM_PROMPT};
pub use schema_registry::{schema_for, validate_against_schema, SchemaRegistry, SchemaValidationError};

// Results
pub use result::{IntentResult, PartialResult};
pub use runner::IntentRunner;
