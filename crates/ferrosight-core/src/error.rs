use thiserror::Error;

use crate::backend::BackendError;

/// Failure taxonomy surfaced by intent execution.
///
/// Streaming terminal failures are deliberately absent: they are reported
/// through [`StreamOutcome`](crate::StreamOutcome) instead of being raised.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntentError {
    #[error("unknown intent '{name}'")]
    UnknownIntent { name: String },

    #[error("invalid request options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String, payload: String },
}

impl IntentError {
    pub fn unknown_intent(name: impl Into<String>) -> Self {
        Self::UnknownIntent { name: name.into() }
    }

    pub fn malformed(reason: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            payload: payload.into(),
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownIntent { .. } => "intent.unknown",
            Self::InvalidOptions(_) => "intent.invalid_options",
            Self::Backend(error) => error.code(),
            Self::MalformedResponse { .. } => "intent.malformed_response",
        }
    }

    /// Only transient backend failures are worth retrying, and never by this crate.
    pub fn retryable(&self) -> bool {
        match self {
            Self::Backend(error) => error.retryable(),
            _ => false,
        }
    }
}

/// Errors raised while assembling backend configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no API key configured for provider '{provider}' (set FERROSIGHT_API_KEY)")]
    MissingApiKey { provider: &'static str },

    #[error("unknown provider '{0}', expected one of gemini, openai")]
    UnknownProvider(String),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(IntentError::unknown_intent("FOO").code(), "intent.unknown");
        assert_eq!(
            IntentError::malformed("bad", "{").code(),
            "intent.malformed_response"
        );
    }

    #[test]
    fn backend_retryability_is_forwarded() {
        let error = IntentError::from(BackendError::rate_limited("gemini", "slow down"));
        assert!(error.retryable());
        assert!(!IntentError::unknown_intent("FOO").retryable());
    }
}
