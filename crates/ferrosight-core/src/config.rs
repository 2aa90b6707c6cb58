//! Environment-driven backend configuration.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `FERROSIGHT_PROVIDER` | `gemini` (default) or `openai` |
//! | `FERROSIGHT_API_KEY` | API key; falls back to `GEMINI_API_KEY` / `OPENAI_API_KEY` |
//! | `FERROSIGHT_MODEL` | Model override |
//! | `FERROSIGHT_ENDPOINT` | Base URL override |
//! | `FERROSIGHT_TEMPERATURE` | Default sampling temperature |
//! | `FERROSIGHT_MAX_OUTPUT_TOKENS` | Default output token cap |
//! | `FERROSIGHT_TIMEOUT_MS` | Per-request transport timeout |
//!
//! Empty values count as unset. API keys never appear in `Debug` output or logs.

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use crate::adapters::{AdapterConfig, GeminiAdapter, OpenAiAdapter};
use crate::backend::Backend;
use crate::error::ConfigError;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::options::{GenerationDefaults, MAX_TEMPERATURE, MIN_TEMPERATURE};

pub const PROVIDER_VAR: &str = "FERROSIGHT_PROVIDER";
pub const API_KEY_VAR: &str = "FERROSIGHT_API_KEY";
pub const MODEL_VAR: &str = "FERROSIGHT_MODEL";
pub const ENDPOINT_VAR: &str = "FERROSIGHT_ENDPOINT";
pub const TEMPERATURE_VAR: &str = "FERROSIGHT_TEMPERATURE";
pub const MAX_OUTPUT_TOKENS_VAR: &str = "FERROSIGHT_MAX_OUTPUT_TOKENS";
pub const TIMEOUT_MS_VAR: &str = "FERROSIGHT_TIMEOUT_MS";

/// Supported hosted model vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Provider {
    #[default]
    Gemini,
    OpenAi,
}

impl Provider {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        }
    }

    /// Vendor-specific variable consulted when `FERROSIGHT_API_KEY` is unset.
    pub const fn api_key_fallback_var(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => GeminiAdapter::DEFAULT_MODEL,
            Self::OpenAi => OpenAiAdapter::DEFAULT_MODEL,
        }
    }

    pub const fn default_endpoint(self) -> &'static str {
        match self {
            Self::Gemini => GeminiAdapter::DEFAULT_ENDPOINT,
            Self::OpenAi => OpenAiAdapter::DEFAULT_ENDPOINT,
        }
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            _ => Err(ConfigError::UnknownProvider(value.to_string())),
        }
    }
}

/// Everything needed to construct a backend adapter.
#[derive(Clone, PartialEq)]
pub struct BackendConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub timeout_ms: Option<u64>,
}

impl BackendConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: None,
            endpoint: None,
            temperature: None,
            max_output_tokens: None,
            timeout_ms: None,
        }
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(None, |key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`. A `provider` given here wins
    /// over `FERROSIGHT_PROVIDER` and selects the API key fallback.
    pub fn from_lookup<F>(provider: Option<Provider>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let provider = match provider {
            Some(provider) => provider,
            None => read(PROVIDER_VAR)
                .map(|value| value.parse::<Provider>())
                .transpose()?
                .unwrap_or_default(),
        };

        let api_key = read(API_KEY_VAR)
            .or_else(|| read(provider.api_key_fallback_var()))
            .ok_or(ConfigError::MissingApiKey {
                provider: provider.as_str(),
            })?;

        let config = Self {
            provider,
            api_key,
            model: read(MODEL_VAR),
            endpoint: read(ENDPOINT_VAR),
            temperature: parse_var(TEMPERATURE_VAR, read(TEMPERATURE_VAR))?,
            max_output_tokens: parse_var(MAX_OUTPUT_TOKENS_VAR, read(MAX_OUTPUT_TOKENS_VAR))?,
            timeout_ms: parse_var(TIMEOUT_MS_VAR, read(TIMEOUT_MS_VAR))?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(temperature) = self.temperature {
            if !temperature.is_finite() || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
                return Err(ConfigError::InvalidValue {
                    key: TEMPERATURE_VAR,
                    value: temperature.to_string(),
                });
            }
        }
        if self.max_output_tokens == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: MAX_OUTPUT_TOKENS_VAR,
                value: String::from("0"),
            });
        }
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: TIMEOUT_MS_VAR,
                value: String::from("0"),
            });
        }
        Ok(())
    }

    /// Generation defaults the adapter will be constructed with.
    pub fn defaults(&self) -> GenerationDefaults {
        let mut defaults = GenerationDefaults::new(
            self.model
                .clone()
                .unwrap_or_else(|| self.provider.default_model().to_string()),
        );
        if let Some(temperature) = self.temperature {
            defaults = defaults.with_temperature(temperature);
        }
        if let Some(max_output_tokens) = self.max_output_tokens {
            defaults = defaults.with_max_output_tokens(max_output_tokens);
        }
        defaults
    }

    pub fn adapter_config(&self) -> AdapterConfig {
        let endpoint = self
            .endpoint
            .as_deref()
            .unwrap_or(self.provider.default_endpoint());
        let config = AdapterConfig::new(self.api_key.clone(), endpoint, self.defaults());
        match self.timeout_ms {
            Some(timeout_ms) => config.with_timeout_ms(timeout_ms),
            None => config,
        }
    }

    /// Builds the configured adapter over `http_client`.
    pub fn build_backend(&self, http_client: Arc<dyn HttpClient>) -> Arc<dyn Backend> {
        let config = self.adapter_config();
        tracing::debug!(
            provider = %self.provider,
            model = %config.defaults.model,
            endpoint = %config.endpoint,
            timeout_ms = config.timeout_ms,
            "configured backend"
        );
        match self.provider {
            Provider::Gemini => Arc::new(GeminiAdapter::with_http_client(config, http_client)),
            Provider::OpenAi => Arc::new(OpenAiAdapter::with_http_client(config, http_client)),
        }
    }

    /// Builds the configured adapter over the production reqwest transport.
    pub fn into_backend(self) -> Arc<dyn Backend> {
        self.build_backend(Arc::new(ReqwestHttpClient::new()))
    }
}

impl Debug for BackendConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

fn parse_var<T: FromStr>(key: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue { key, value: raw.clone() })
        })
        .transpose()
}
