//! # Schema Registry
//!
//! Static mapping from [`Intent`] to the output schema a backend must
//! conform to, plus the local validator used to reject malformed terminal
//! responses.
//!
//! Schemas are JSON-Schema-style documents (`type`, `properties`,
//! `required`, `items`, `enum`, `minimum`, `maximum`, `minItems`). Adapters
//! hand them to the backend as the structural contract; vendors that want a
//! different dialect convert them at the adapter boundary.
//!
//! ## Example
//!
//! ```rust
//! use ferrosight_core::schema_registry::{schema_for, validate_against_schema};
//! use ferrosight_core::Intent;
//! use serde_json::json;
//!
//! let schema = schema_for(Intent::Summarize).unwrap();
//! let value = json!({ "summary": "up", "keyPoints": [], "confidence": 0.9 });
//! assert!(validate_against_schema(&value, schema).is_ok());
//! ```

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::IntentError;
use crate::intent::{Intent, IntentKey};

static SCHEMAS: OnceLock<[Value; 8]> = OnceLock::new();

/// Returns the output schema registered for `key`.
pub fn schema_for(key: impl IntentKey) -> Result<&'static Value, IntentError> {
    let intent = key.resolve()?;
    Ok(schema_of(intent))
}

/// Infallible lookup for an already-resolved intent.
pub(crate) fn schema_of(intent: Intent) -> &'static Value {
    &schemas()[intent.index()]
}

fn schemas() -> &'static [Value; 8] {
    SCHEMAS.get_or_init(|| Intent::ALL.map(schema_document))
}

/// Read-only view over the registered schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaRegistry;

impl SchemaRegistry {
    /// All `(intent, schema)` pairs in catalog order.
    pub fn list(&self) -> Vec<(Intent, &'static Value)> {
        Intent::ALL
            .into_iter()
            .map(|intent| (intent, schema_of(intent)))
            .collect()
    }

    pub fn get(&self, key: impl IntentKey) -> Result<&'static Value, IntentError> {
        schema_for(key)
    }

    pub fn validate(&self, intent: Intent, value: &Value) -> Result<(), SchemaValidationError> {
        validate_against_schema(value, schema_of(intent))
    }
}

fn confidence() -> Value {
    json!({ "type": "number", "minimum": 0, "maximum": 1 })
}

fn string_array() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

fn schema_document(intent: Intent) -> Value {
    match intent {
        Intent::Explain => json!({
            "type": "object",
            "required": ["explanation", "bullets", "drivers", "anomalies", "confidence"],
            "properties": {
                "explanation": { "type": "string", "minLength": 1 },
                "bullets": string_array(),
                "drivers": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name", "impact"],
                        "properties": {
                            "name": { "type": "string" },
                            "impact": { "type": "number", "minimum": -100, "maximum": 100 }
                        }
                    }
                },
                "anomalies": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["index", "reason"],
                        "properties": {
                            "index": { "type": "integer", "minimum": 0 },
                            "reason": { "type": "string" }
                        }
                    }
                },
                "confidence": confidence()
            }
        }),
        Intent::Forecast => json!({
            "type": "object",
            "required": ["predictions", "confidence"],
            "properties": {
                "horizon": { "type": "integer", "minimum": 1 },
                "predictions": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["period", "value", "lower", "upper"],
                        "properties": {
                            "period": { "type": "string" },
                            "value": { "type": "number" },
                            "lower": { "type": "number" },
                            "upper": { "type": "number" }
                        }
                    }
                },
                "method": { "type": "string" },
                "summary": { "type": "string" },
                "confidence": confidence()
            }
        }),
        Intent::DetectAnomaly => json!({
            "type": "object",
            "required": ["anomalies", "confidence"],
            "properties": {
                "anomalies": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["index", "reason", "severity"],
                        "properties": {
                            "index": { "type": "integer", "minimum": 0 },
                            "value": { "type": "number" },
                            "reason": { "type": "string" },
                            "severity": { "type": "string", "enum": ["low", "medium", "high"] }
                        }
                    }
                },
                "summary": { "type": "string" },
                "confidence": confidence()
            }
        }),
        Intent::Summarize => json!({
            "type": "object",
            "required": ["summary", "keyPoints", "confidence"],
            "properties": {
                "summary": { "type": "string", "minLength": 1 },
                "keyPoints": string_array(),
                "confidence": confidence()
            }
        }),
        Intent::Classify => json!({
            "type": "object",
            "required": ["classifications", "confidence"],
            "properties": {
                "labels": string_array(),
                "classifications": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["index", "label"],
                        "properties": {
                            "index": { "type": "integer", "minimum": 0 },
                            "label": { "type": "string" },
                            "score": { "type": "number", "minimum": 0, "maximum": 1 }
                        }
                    }
                },
                "rationale": { "type": "string" },
                "confidence": confidence()
            }
        }),
        Intent::Optimize => json!({
            "type": "object",
            "required": ["recommendations", "confidence"],
            "properties": {
                "objective": { "type": "string" },
                "recommendations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["action", "rationale"],
                        "properties": {
                            "action": { "type": "string" },
                            "rationale": { "type": "string" },
                            "expectedImpact": { "type": "string" }
                        }
                    }
                },
                "tradeoffs": string_array(),
                "confidence": confidence()
            }
        }),
        Intent::Compare => json!({
            "type": "object",
            "required": ["summary", "differences", "confidence"],
            "properties": {
                "summary": { "type": "string" },
                "similarities": string_array(),
                "differences": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["aspect", "detail"],
                        "properties": {
                            "aspect": { "type": "string" },
                            "detail": { "type": "string" },
                            "delta": { "type": "number" }
                        }
                    }
                },
                "winner": { "type": "string" },
                "confidence": confidence()
            }
        }),
        Intent::Cluster => json!({
            "type": "object",
            "required": ["clusters", "confidence"],
            "properties": {
                "clusters": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["id", "label", "members"],
                        "properties": {
                            "id": { "type": "integer", "minimum": 0 },
                            "label": { "type": "string" },
                            "members": {
                                "type": "array",
                                "items": { "type": "integer", "minimum": 0 }
                            },
                            "characteristics": string_array()
                        }
                    }
                },
                "summary": { "type": "string" },
                "confidence": confidence()
            }
        }),
    }
}

/// Schema validation error details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{path}: {message}")]
pub struct SchemaValidationError {
    /// Path to the invalid field, rooted at `$`.
    pub path: String,
    pub message: String,
}

impl SchemaValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Validate JSON against a schema.
///
/// Supports the keyword subset used by the registry: `type`, `required`,
/// `properties`, `items`, `enum`, `minimum`, `maximum`, `minItems` and
/// `minLength`. Unknown keywords are ignored.
pub fn validate_against_schema(value: &Value, schema: &Value) -> Result<(), SchemaValidationError> {
    let schema_obj = schema
        .as_object()
        .ok_or_else(|| SchemaValidationError::new("$", "schema must be an object"))?;

    validate_value(value, schema_obj, "$")
}

fn validate_value(
    value: &Value,
    schema: &serde_json::Map<String, Value>,
    path: &str,
) -> Result<(), SchemaValidationError> {
    if let Some(schema_type) = schema.get("type") {
        validate_type(value, schema_type, path)?;
    }

    if let (Some(required), Value::Object(obj)) = (schema.get("required"), value) {
        if let Some(required_arr) = required.as_array() {
            for field in required_arr.iter().filter_map(Value::as_str) {
                if !obj.contains_key(field) {
                    return Err(SchemaValidationError::new(
                        format!("{path}/{field}"),
                        format!("required field '{field}' is missing"),
                    ));
                }
            }
        }
    }

    if let (Some(properties), Value::Object(obj)) = (schema.get("properties"), value) {
        if let Some(props_obj) = properties.as_object() {
            for (key, prop_schema) in props_obj {
                if let (Some(prop_value), Some(prop_schema_obj)) =
                    (obj.get(key), prop_schema.as_object())
                {
                    validate_value(prop_value, prop_schema_obj, &format!("{path}/{key}"))?;
                }
            }
        }
    }

    if let (Some(items), Value::Array(arr)) = (schema.get("items"), value) {
        if let Some(items_schema) = items.as_object() {
            for (i, item) in arr.iter().enumerate() {
                validate_value(item, items_schema, &format!("{path}/{i}"))?;
            }
        }
    }

    if let (Some(min_items), Value::Array(arr)) = (schema.get("minItems"), value) {
        if let Some(min) = min_items.as_u64() {
            if (arr.len() as u64) < min {
                return Err(SchemaValidationError::new(
                    path,
                    format!("array must have at least {min} items, found {}", arr.len()),
                ));
            }
        }
    }

    if let (Some(min_length), Value::String(s)) = (schema.get("minLength"), value) {
        if let Some(min) = min_length.as_u64() {
            let length = s.chars().count() as u64;
            if length < min {
                return Err(SchemaValidationError::new(
                    path,
                    format!("string must have at least {min} characters, found {length}"),
                ));
            }
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(SchemaValidationError::new(
                path,
                format!("value {value} is not one of {}", Value::Array(allowed.clone())),
            ));
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(minimum) = schema.get("minimum").and_then(Value::as_f64) {
            if number < minimum {
                return Err(SchemaValidationError::new(
                    path,
                    format!("value {number} is below minimum {minimum}"),
                ));
            }
        }
        if let Some(maximum) = schema.get("maximum").and_then(Value::as_f64) {
            if number > maximum {
                return Err(SchemaValidationError::new(
                    path,
                    format!("value {number} is above maximum {maximum}"),
                ));
            }
        }
    }

    Ok(())
}

fn validate_type(value: &Value, schema_type: &Value, path: &str) -> Result<(), SchemaValidationError> {
    let type_str = schema_type
        .as_str()
        .ok_or_else(|| SchemaValidationError::new(path, "schema type must be a string"))?;

    let matches = match (type_str, value) {
        ("object", Value::Object(_)) => true,
        ("array", Value::Array(_)) => true,
        ("string", Value::String(_)) => true,
        // `3.0` is rejected: typed models decode integer fields as integers.
        ("integer", Value::Number(n)) => n.is_i64() || n.is_u64(),
        ("number", Value::Number(_)) => true,
        ("boolean", Value::Bool(_)) => true,
        ("null", Value::Null) => true,
        _ => false,
    };

    if !matches {
        return Err(SchemaValidationError::new(
            path,
            format!("expected type '{type_str}', found '{}'", value_type_name(value)),
        ));
    }

    Ok(())
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
