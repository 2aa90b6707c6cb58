use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Input data for an intent.
///
/// The record shape is dataset-defined; the core only serializes records
/// into the prompt and never mutates them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub dataset: Vec<Value>,
    /// Sub-sequence of interest or comparison target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Value>,
    #[serde(default)]
    pub meta: ContextMeta,
}

impl Context {
    pub fn new(dataset: Vec<Value>) -> Self {
        Self {
            dataset,
            selection: None,
            meta: ContextMeta::default(),
        }
    }

    pub fn with_selection(mut self, selection: Value) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_meta(mut self, meta: ContextMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// Free-form annotations rendered into the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMeta {
    #[serde(
        default,
        deserialize_with = "text_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeframe: Option<String>,
    #[serde(
        default,
        deserialize_with = "text_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub unit: Option<String>,
    #[serde(
        default,
        deserialize_with = "text_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<String>,
    #[serde(
        default,
        deserialize_with = "text_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub data_type: Option<String>,
    #[serde(flatten, deserialize_with = "text_entries")]
    pub extra: BTreeMap<String, String>,
}

/// Meta values are free-form JSON. Strings are kept as-is, other values in
/// their compact JSON form, and `null` counts as absent.
fn as_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

fn text_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(as_text))
}

fn text_entries<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|(key, value)| as_text(value).map(|text| (key, text)))
        .collect())
}

impl ContextMeta {
    pub fn with_timeframe(mut self, timeframe: impl Into<String>) -> Self {
        self.timeframe = Some(timeframe.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Sets a field by its wire key; unrecognised keys land in `extra`.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match key {
            "timeframe" => self.timeframe = Some(value),
            "unit" => self.unit = Some(value),
            "category" => self.category = Some(value),
            "dataType" | "data_type" => self.data_type = Some(value),
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
    }

    /// Present entries in render order: well-known keys first, then `extra` by key.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let known = [
            ("timeframe", self.timeframe.as_deref()),
            ("unit", self.unit.as_deref()),
            ("category", self.category.as_deref()),
            ("dataType", self.data_type.as_deref()),
        ];

        known
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .chain(
                self.extra
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str())),
            )
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
