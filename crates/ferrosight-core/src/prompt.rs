//! Prompt builder.
//!
//! Pure rendering of `(intent, context)` into instruction text. The output
//! is a function of its inputs only, so identical inputs always produce
//! identical prompts. Records are serialized as-is: no truncation and no
//! sanitisation, callers bound dataset size before building a prompt.

use std::fmt::Write;

use serde_json::Value;

use crate::context::{Context, ContextMeta};
use crate::error::IntentError;
use crate::intent::{Intent, IntentKey};

/// System instruction used when neither the adapter nor the call overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a data analysis engine. \
Answer with exactly one JSON object that conforms to the response schema you are given. \
Do not wrap the JSON in markdown and do not add commentary before or after it.";

/// Renders the instruction text for `key` over `context`.
pub fn build_prompt(key: impl IntentKey, context: &Context) -> Result<String, IntentError> {
    let intent = key.resolve()?;
    Ok(render(intent, context))
}

fn render(intent: Intent, context: &Context) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Task ({}): {}", intent.as_str(), task_line(intent));
    prompt.push('\n');

    append_meta(&mut prompt, &context.meta);

    let _ = writeln!(prompt, "Dataset ({} records):", context.dataset.len());
    let _ = writeln!(prompt, "{}", compact_records(&context.dataset));

    if intent.uses_selection() {
        append_selection(&mut prompt, intent, context.selection.as_ref());
    }

    prompt.push_str("\nReturn a JSON object with exactly these fields:\n");
    for field in output_fields(intent) {
        let _ = writeln!(prompt, "- {field}");
    }
    prompt.push_str("- confidence: number from 0 to 1 expressing how well the data supports the answer\n");
    prompt.push_str("\nRefer to records by their zero-based position in the dataset. Return JSON only.\n");
    prompt
}

fn task_line(intent: Intent) -> &'static str {
    match intent {
        Intent::Explain => "Explain what the dataset shows and what drives it.",
        Intent::Forecast => "Forecast the next values of the series.",
        Intent::DetectAnomaly => "Find records that deviate from the expected pattern.",
        Intent::Summarize => "Summarize the dataset for a busy reader.",
        Intent::Classify => "Assign every record to a category.",
        Intent::Optimize => "Recommend concrete actions that improve the measured outcome.",
        Intent::Compare => "Compare the dataset against the comparison target.",
        Intent::Cluster => "Group similar records into clusters.",
    }
}

fn output_fields(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::Explain => &[
            "explanation: string, a short narrative of what the data shows",
            "bullets: array of short strings, one observation each",
            "drivers: array of { name: string, impact: number from -100 to 100 }",
            "anomalies: array of { index: integer, reason: string }",
        ],
        Intent::Forecast => &[
            "horizon: integer, number of future periods forecast",
            "predictions: array of { period: string, value: number, lower: number, upper: number } where lower and upper bound the confidence interval",
            "method: string, the forecasting approach",
            "summary: string",
        ],
        Intent::DetectAnomaly => &[
            "anomalies: array of { index: integer, value: number, reason: string, severity: one of \"low\", \"medium\", \"high\" }",
            "summary: string",
        ],
        Intent::Summarize => &[
            "summary: string",
            "keyPoints: array of short strings",
        ],
        Intent::Classify => &[
            "labels: array of the category names used",
            "classifications: array of { index: integer, label: string, score: number from 0 to 1 }",
            "rationale: string",
        ],
        Intent::Optimize => &[
            "objective: string, the outcome being improved",
            "recommendations: array of { action: string, rationale: string, expectedImpact: string }",
            "tradeoffs: array of strings",
        ],
        Intent::Compare => &[
            "summary: string",
            "similarities: array of strings",
            "differences: array of { aspect: string, detail: string, delta: number }",
            "winner: string, which side compares favourably, if any",
        ],
        Intent::Cluster => &[
            "clusters: array of { id: integer, label: string, members: array of record indices, characteristics: array of strings }",
            "summary: string",
        ],
    }
}

fn append_meta(prompt: &mut String, meta: &ContextMeta) {
    let entries = meta.entries();
    if entries.is_empty() {
        return;
    }
    prompt.push_str("Metadata:\n");
    for (key, value) in entries {
        let _ = writeln!(prompt, "- {key}: {value}");
    }
    prompt.push('\n');
}

fn append_selection(prompt: &mut String, intent: Intent, selection: Option<&Value>) {
    let label = match intent {
        Intent::Compare => "Comparison target",
        Intent::Classify => "Records to classify",
        Intent::DetectAnomaly => "Window to inspect",
        _ => "Focus selection",
    };

    match selection {
        Some(selection) => {
            let _ = writeln!(prompt, "\n{label}:\n{selection}");
        }
        None if intent == Intent::Compare => {
            let _ = writeln!(
                prompt,
                "\n{label}: none supplied, compare the first half of the dataset with the second half."
            );
        }
        None => {}
    }
}

fn compact_records(records: &[Value]) -> String {
    let mut out = String::from("[");
    for (position, record) in records.iter().enumerate() {
        if position > 0 {
            out.push(',');
        }
        let _ = write!(out, "{record}");
    }
    out.push(']');
    out
}
