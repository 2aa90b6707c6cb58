use ferrosight_core::Intent;
use serde::Serialize;
use serde_json::Value;

use super::CommandOutput;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IntentEntry {
    name: Intent,
    description: &'static str,
    uses_selection: bool,
}

pub fn run() -> CommandOutput {
    let entries: Vec<Value> = Intent::ALL
        .into_iter()
        .map(|intent| IntentEntry {
            name: intent,
            description: intent.description(),
            uses_selection: intent.uses_selection(),
        })
        .filter_map(|entry| serde_json::to_value(entry).ok())
        .collect();

    CommandOutput::Json(Value::Array(entries))
}
