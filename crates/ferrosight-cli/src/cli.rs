//! CLI argument definitions for Ferrosight.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `intents` | List the intent catalog |
//! | `schema` | Print an intent's output schema |
//! | `prompt` | Render the prompt an intent would send |
//! | `run` | Execute an intent against the configured backend |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! # Summarize a dataset with the default (Gemini) backend
//! ferrosight run summarize --dataset spend.json --meta unit=USD
//!
//! # Stream anomaly detection as NDJSON events
//! ferrosight run detect_anomaly --dataset latency.json --stream --provider openai
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ferrosight_core::Provider;

/// Ferrosight - schema-constrained LLM analysis of tabular data
#[derive(Debug, Parser)]
#[command(
    name = "ferrosight",
    author,
    version,
    about = "Schema-constrained LLM analysis of tabular data",
    long_about = "Ferrosight sends a dataset and an analytical intent (explain, forecast, detect \
anomalies, summarize, classify, optimize, compare, cluster) to a hosted language model and \
returns a schema-validated JSON result.\n\
\n\
Backend configuration is read from FERROSIGHT_* environment variables; flags override them.\n\
Set FERROSIGHT_LOG (e.g. 'debug') to see diagnostics on stderr."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List supported intents.
    Intents,

    /// Print the JSON schema results of an intent must satisfy.
    ///
    /// # Examples
    ///
    ///   ferrosight schema forecast --pretty
    Schema(SchemaArgs),

    /// Render the prompt for an intent without calling a backend.
    ///
    /// # Examples
    ///
    ///   ferrosight prompt explain --dataset sales.json --selection point.json
    Prompt(PromptArgs),

    /// Execute an intent.
    ///
    /// Prints a JSON document with run metadata and the validated result, or
    /// NDJSON events (start, partial, result, incomplete, error) with --stream.
    ///
    /// # Examples
    ///
    ///   ferrosight run forecast --dataset revenue.json --meta timeframe=monthly
    ///   ferrosight run cluster --dataset users.json --stream --model gpt-4o
    Run(RunArgs),
}

/// Arguments for the `schema` command.
#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Intent name (case-insensitive, e.g. 'forecast' or 'DETECT_ANOMALY').
    pub intent: String,
}

/// Context input shared by `prompt` and `run`.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// JSON file with the dataset: an array of records or a full context
    /// object (`dataset`, `selection`, `meta`). Use '-' for stdin.
    #[arg(long)]
    pub dataset: PathBuf,

    /// JSON file with the selected record(s) for EXPLAIN, DETECT_ANOMALY,
    /// CLASSIFY and COMPARE.
    #[arg(long)]
    pub selection: Option<PathBuf>,

    /// Context metadata as key=value (timeframe, unit, category, dataType or
    /// any custom key). Repeatable.
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta_pair)]
    pub meta: Vec<(String, String)>,
}

/// Arguments for the `prompt` command.
#[derive(Debug, Args)]
pub struct PromptArgs {
    pub intent: String,

    #[command(flatten)]
    pub input: InputArgs,
}

/// Arguments for the `run` command.
#[derive(Debug, Args)]
pub struct RunArgs {
    pub intent: String,

    #[command(flatten)]
    pub input: InputArgs,

    /// Backend provider (overrides FERROSIGHT_PROVIDER).
    #[arg(long, value_enum)]
    pub provider: Option<ProviderArg>,

    /// Model name (overrides FERROSIGHT_MODEL).
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature in [0, 2].
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens.
    #[arg(long)]
    pub max_output_tokens: Option<u32>,

    /// Replace the default system prompt.
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Stream NDJSON events instead of printing one result.
    #[arg(long, default_value_t = false)]
    pub stream: bool,
}

/// Provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    /// Google Gemini.
    Gemini,
    /// OpenAI chat completions.
    Openai,
}

impl From<ProviderArg> for Provider {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Gemini => Provider::Gemini,
            ProviderArg::Openai => Provider::OpenAi,
        }
    }
}

fn parse_meta_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
