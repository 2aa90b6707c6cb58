use ferrosight_core::SchemaRegistry;

use crate::cli::SchemaArgs;
use crate::error::CliError;

use super::CommandOutput;

pub fn run(args: &SchemaArgs) -> Result<CommandOutput, CliError> {
    let schema = SchemaRegistry.get(args.intent.as_str())?;
    Ok(CommandOutput::Json(schema.clone()))
}
