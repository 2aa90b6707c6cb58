mod input;
mod intents;
mod prompt;
mod run;
mod schema;

use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub use input::load_context;

/// What a command leaves for `main` to print.
#[derive(Debug)]
pub enum CommandOutput {
    Json(Value),
    Text(String),
    /// Output was already written incrementally.
    Streamed,
}

pub async fn run(cli: &Cli) -> Result<CommandOutput, CliError> {
    match &cli.command {
        Command::Intents => Ok(intents::run()),
        Command::Schema(args) => schema::run(args),
        Command::Prompt(args) => prompt::run(args),
        Command::Run(args) => run::run(args).await,
    }
}
