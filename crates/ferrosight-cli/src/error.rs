use ferrosight_core::{ConfigError, IntentError, StreamOutcome};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error("{}", .0.describe())]
    StreamEnded(StreamOutcome),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Stream(#[from] ferrosight_agent::StreamError),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) | Self::Config(_) => 2,
            Self::Intent(error) => match error {
                IntentError::UnknownIntent { .. } | IntentError::InvalidOptions(_) => 2,
                IntentError::Backend(_) => 3,
                IntentError::MalformedResponse { .. } => 4,
            },
            Self::StreamEnded(StreamOutcome::Interrupted(_)) => 3,
            Self::StreamEnded(_) => 6,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
            Self::Stream(_) => 6,
        }
    }
}
