use ferrosight_core::build_prompt;

use crate::cli::PromptArgs;
use crate::error::CliError;

use super::{load_context, CommandOutput};

pub fn run(args: &PromptArgs) -> Result<CommandOutput, CliError> {
    let context = load_context(&args.input)?;
    let prompt = build_prompt(args.intent.as_str(), &context)?;
    Ok(CommandOutput::Text(prompt))
}
