use serde::{Deserialize, Serialize};

use crate::error::IntentError;
use crate::prompt::DEFAULT_SYSTEM_PROMPT;

pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Per-call overrides. Absent fields fall back to [`GenerationDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl RequestOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
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

    pub fn validate(&self) -> Result<(), IntentError> {
        if let Some(temperature) = self.temperature {
            validate_temperature(temperature)?;
        }
        if self.max_output_tokens == Some(0) {
            return Err(IntentError::InvalidOptions(String::from(
                "maxOutputTokens must be greater than zero",
            )));
        }
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(IntentError::InvalidOptions(String::from(
                    "model must not be empty",
                )));
            }
        }
        Ok(())
    }

    /// Merges these overrides over `defaults`.
    pub fn resolve(&self, defaults: &GenerationDefaults) -> GenerationDefaults {
        GenerationDefaults {
            model: self.model.clone().unwrap_or_else(|| defaults.model.clone()),
            system_prompt: self
                .system_prompt
                .clone()
                .unwrap_or_else(|| defaults.system_prompt.clone()),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_output_tokens: self.max_output_tokens.unwrap_or(defaults.max_output_tokens),
        }
    }
}

fn validate_temperature(temperature: f32) -> Result<(), IntentError> {
    if !temperature.is_finite() || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(IntentError::InvalidOptions(format!(
            "temperature must be within {MIN_TEMPERATURE}..={MAX_TEMPERATURE}, got {temperature}"
        )));
    }
    Ok(())
}

/// Generation settings fixed when an adapter is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationDefaults {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationDefaults {
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;
    pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2_048;

    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: String::from(DEFAULT_SYSTEM_PROMPT),
            temperature: Self::DEFAULT_TEMPERATURE,
            max_output_tokens: Self::DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_overrides_and_falls_back_per_field() {
        let defaults = GenerationDefaults::new("base-model").with_temperature(0.4);
        let options = RequestOptions::default()
            .with_model("override-model")
            .with_max_output_tokens(512);

        let resolved = options.resolve(&defaults);

        assert_eq!(resolved.model, "override-model");
        assert_eq!(resolved.temperature, 0.4);
        assert_eq!(resolved.max_output_tokens, 512);
        assert_eq!(resolved.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn validate_rejects_out_of_range_temperature() {
        for temperature in [-0.1, 2.5, f32::NAN] {
            let options = RequestOptions::default().with_temperature(temperature);
            assert!(
                matches!(options.validate(), Err(IntentError::InvalidOptions(_))),
                "temperature {temperature} should be rejected"
            );
        }
        assert!(RequestOptions::default().with_temperature(2.0).validate().is_ok());
        assert!(RequestOptions::default().with_temperature(0.0).validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_token_budget() {
        let options = RequestOptions::default().with_max_output_tokens(0);
        assert!(options.validate().is_err());
    }
}
