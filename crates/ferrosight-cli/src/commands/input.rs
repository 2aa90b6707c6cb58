use std::io::Read;
use std::path::Path;

use ferrosight_core::Context;
use serde_json::Value;

use crate::cli::InputArgs;
use crate::error::CliError;

/// Builds the intent context from `--dataset`, `--selection` and `--meta`.
///
/// Flags win over the `selection` and `meta` of a full context file.
pub fn load_context(args: &InputArgs) -> Result<Context, CliError> {
    let mut context = match read_json(&args.dataset)? {
        Value::Array(records) => Context::new(records),
        value @ Value::Object(_) if value.get("dataset").is_some() => {
            serde_json::from_value::<Context>(value).map_err(|error| {
                CliError::Usage(format!(
                    "invalid context file '{}': {error}",
                    args.dataset.display()
                ))
            })?
        }
        _ => {
            return Err(CliError::Usage(format!(
                "'{}' must hold a JSON array of records or an object with a 'dataset' array",
                args.dataset.display()
            )))
        }
    };

    if let Some(path) = &args.selection {
        context.selection = Some(read_json(path)?);
    }
    for (key, value) in &args.meta {
        context.meta.insert(key, value.clone());
    }

    tracing::debug!(
        records = context.dataset.len(),
        selection = context.selection.is_some(),
        "loaded context"
    );
    Ok(context)
}

fn read_json(path: &Path) -> Result<Value, CliError> {
    let raw = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };

    serde_json::from_str(&raw).map_err(|error| {
        CliError::Usage(format!("'{}' is not valid JSON: {error}", path.display()))
    })
}
