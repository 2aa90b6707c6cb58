//! # Backend Adapters
//!
//! Concrete [`Backend`](crate::Backend) implementations for hosted language
//! models. Each adapter turns a [`GenerationRequest`](crate::GenerationRequest)
//! into one vendor call through an injected [`HttpClient`](crate::http_client::HttpClient),
//! so tests can drive them offline with
//! [`ScriptedHttpClient`](crate::http_client::ScriptedHttpClient).
//!
//! | Adapter | Vendor API | Streaming |
//! |---------|------------|-----------|
//! | [`GeminiAdapter`] | `generateContent` | `streamGenerateContent?alt=sse` |
//! | [`OpenAiAdapter`] | `chat/completions` | `stream: true` SSE |

mod gemini;
mod openai;

use std::fmt::{Debug, Formatter};

use crate::backend::BackendError;
use crate::http_client::{HttpClient, HttpError, HttpRequest};
use crate::options::GenerationDefaults;

pub use gemini::{to_openapi_schema, GeminiAdapter};
pub use openai::OpenAiAdapter;

/// Connection settings shared by every adapter.
#[derive(Clone, PartialEq)]
pub struct AdapterConfig {
    pub api_key: String,
    /// Base URL without a trailing slash.
    pub endpoint: String,
    pub timeout_ms: u64,
    pub defaults: GenerationDefaults,
}

impl AdapterConfig {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        defaults: GenerationDefaults,
    ) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            api_key: api_key.into(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout_ms: HttpRequest::DEFAULT_TIMEOUT_MS,
            defaults,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl Debug for AdapterConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout_ms", &self.timeout_ms)
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// Sends a buffered request and maps transport and status failures.
async fn execute_checked(
    backend: &str,
    http_client: &dyn HttpClient,
    request: HttpRequest,
) -> Result<String, BackendError> {
    let response = http_client
        .execute(request)
        .await
        .map_err(|error| transport_error(backend, &error))?;

    if !response.is_success() {
        return Err(BackendError::from_status(backend, response.status, &response.body));
    }
    Ok(response.body)
}

fn transport_error(backend: &str, error: &HttpError) -> BackendError {
    BackendError::transport(backend, format!("transport error: {}", error.message()))
}
