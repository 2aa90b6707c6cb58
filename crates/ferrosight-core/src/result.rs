use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::IntentOutput;
use crate::error::IntentError;
use crate::intent::Intent;

/// Terminal, schema-validated result of an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    pub value: Value,
}

impl IntentResult {
    pub fn new(intent: Intent, value: Value) -> Self {
        Self { intent, value }
    }

    pub fn confidence(&self) -> Option<f64> {
        confidence_of(&self.value)
    }

    /// Decodes the value into the typed model for this result's intent.
    ///
    /// Fails with `MalformedResponse` when `T` belongs to another intent or
    /// the value does not fit the model.
    pub fn typed<T: IntentOutput>(&self) -> Result<T, IntentError> {
        if T::INTENT != self.intent {
            return Err(IntentError::malformed(
                format!("cannot decode a {} result as {}", self.intent, T::INTENT),
                self.value.to_string(),
            ));
        }
        T::deserialize(&self.value).map_err(|error| {
            IntentError::malformed(
                format!("{} result does not fit its model: {error}", self.intent),
                self.value.to_string(),
            )
        })
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Possibly-incomplete decoding of an in-progress streamed response.
///
/// `sequence` starts at 1 and increases with every emission of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialResult {
    pub intent: Intent,
    pub sequence: u64,
    pub value: Value,
}

impl PartialResult {
    pub fn confidence(&self) -> Option<f64> {
        confidence_of(&self.value)
    }

    pub fn into_result(self) -> IntentResult {
        IntentResult::new(self.intent, self.value)
    }
}

fn confidence_of(value: &Value) -> Option<f64> {
    value.get("confidence").and_then(Value::as_f64)
}
