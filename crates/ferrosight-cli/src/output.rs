use std::io::Write;

use serde_json::Value;

use crate::commands::CommandOutput;
use crate::error::CliError;

pub fn render(output: &CommandOutput, pretty: bool) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_output(&mut handle, output, pretty)?;
    handle.flush()?;
    Ok(())
}

fn write_output<W: Write>(out: &mut W, output: &CommandOutput, pretty: bool) -> Result<(), CliError> {
    match output {
        CommandOutput::Json(value) => writeln!(out, "{}", to_json(value, pretty)?)?,
        CommandOutput::Text(text) => writeln!(out, "{text}")?,
        CommandOutput::Streamed => {}
    }
    Ok(())
}

fn to_json(value: &Value, pretty: bool) -> Result<String, CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}
