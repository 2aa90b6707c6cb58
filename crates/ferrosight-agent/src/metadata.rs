//! # Run Metadata
//!
//! - [`RequestId`]: UUID v4 identifier attached to every run
//! - [`RunMetadata`]: what ran, where, and how long it took
//!
//! ## Example
//!
//! ```rust,ignore
//! use ferrosight_agent::metadata::{RequestId, RunMetadata};
//! use ferrosight_core::Intent;
//!
//! let metadata = RunMetadata::new(Intent::Forecast, "gemini", "gemini-2.5-flash")
//!     .streamed()
//!     .with_latency_ms(812);
//! ```

use std::fmt::{self, Display, Formatter};

use ferrosight_core::Intent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request identifier (UUID v4) for correlating NDJSON events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(input: &str) -> Result<Self, MetadataError> {
        let uuid =
            Uuid::parse_str(input).map_err(|_| MetadataError::InvalidRequestId(input.to_string()))?;
        Ok(Self(uuid))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new_v4()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("invalid request id '{0}'")]
    InvalidRequestId(String),
}

/// Metadata describing one intent run.
///
/// Field order is deterministic for stable JSON serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub request_id: RequestId,
    pub intent: Intent,
    pub backend: String,
    pub model: String,
    pub streamed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RunMetadata {
    pub fn new(intent: Intent, backend: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new_v4(),
            intent,
            backend: backend.into(),
            model: model.into(),
            streamed: false,
            latency_ms: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn streamed(mut self) -> Self {
        self.streamed = true;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}
