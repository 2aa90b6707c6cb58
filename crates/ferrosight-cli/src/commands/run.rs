use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use ferrosight_agent::{relay_intent_stream, NdjsonStreamWriter, RunMetadata, StreamEventError};
use ferrosight_core::{
    Backend, BackendConfig, Context, Intent, IntentError, IntentRunner, RequestOptions,
};
use serde_json::json;

use crate::cli::RunArgs;
use crate::error::CliError;

use super::{load_context, CommandOutput};

pub async fn run(args: &RunArgs) -> Result<CommandOutput, CliError> {
    let intent = Intent::parse(&args.intent)?;
    let context = load_context(&args.input)?;

    let config = BackendConfig::from_lookup(args.provider.map(Into::into), |key| {
        std::env::var(key).ok()
    })?;
    let backend = config.into_backend();

    execute(intent, &context, args, backend, std::io::stdout().lock()).await
}

/// Runs `intent` on `backend`. Streamed runs write NDJSON to `out`; single
/// runs return the result document for `main` to print.
pub async fn execute<W: Write>(
    intent: Intent,
    context: &Context,
    args: &RunArgs,
    backend: Arc<dyn Backend>,
    out: W,
) -> Result<CommandOutput, CliError> {
    let options = request_options(args);
    let model = options
        .model
        .clone()
        .unwrap_or_else(|| backend.defaults().model.clone());
    let runner = IntentRunner::new(backend);
    let metadata = RunMetadata::new(intent, runner.backend().name(), model);
    let started = Instant::now();

    if !args.stream {
        let result = runner.run(intent, context, Some(options)).await?;
        let metadata = metadata.with_latency_ms(elapsed_ms(started));
        return Ok(CommandOutput::Json(json!({
            "meta": metadata,
            "data": result.value,
        })));
    }

    let mut writer = NdjsonStreamWriter::new(out);
    writer.emit_start(Some(serde_json::to_value(metadata.streamed())?))?;

    let stream = match runner.stream(intent, context, Some(options)).await {
        Ok(stream) => stream,
        Err(error) => {
            writer.emit_error(event_error(&error), None)?;
            return Err(error.into());
        }
    };

    let outcome = relay_intent_stream(stream, &mut writer).await?;
    tracing::debug!(
        %intent,
        outcome = outcome.code(),
        latency_ms = elapsed_ms(started),
        "stream finished"
    );

    if outcome.is_complete() {
        Ok(CommandOutput::Streamed)
    } else {
        Err(CliError::StreamEnded(outcome))
    }
}

fn request_options(args: &RunArgs) -> RequestOptions {
    RequestOptions {
        model: args.model.clone(),
        system_prompt: args.system_prompt.clone(),
        temperature: args.temperature,
        max_output_tokens: args.max_output_tokens,
    }
}

fn event_error(error: &IntentError) -> StreamEventError {
    match error {
        IntentError::Backend(cause) => StreamEventError::from_backend(cause),
        other => StreamEventError::new(other.code(), other.to_string()).with_retryable(false),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
