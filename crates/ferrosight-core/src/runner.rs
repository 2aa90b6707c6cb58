use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::assembler::IntentStream;
use crate::backend::{Backend, IntentExecutor};
use crate::context::Context;
use crate::error::IntentError;
use crate::intent::IntentKey;
use crate::options::RequestOptions;
use crate::result::IntentResult;

/// Entry point for executing intents against a backend.
///
/// Holds no mutable state; clones share the backend and concurrent calls
/// do not interact.
#[derive(Clone)]
pub struct IntentRunner {
    backend: Arc<dyn Backend>,
}

impl IntentRunner {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Executes `key` in one round trip and returns the validated result.
    pub async fn run(
        &self,
        key: impl IntentKey,
        context: &Context,
        options: Option<RequestOptions>,
    ) -> Result<IntentResult, IntentError> {
        let intent = key.resolve()?;
        let options = options.unwrap_or_default();
        tracing::debug!(
            %intent,
            backend = self.backend.name(),
            model = %self.model_for(&options),
            records = context.dataset.len(),
            "running intent"
        );

        let result = self.backend.execute_intent(intent, context, &options).await;
        if let Err(error) = &result {
            tracing::warn!(%intent, backend = self.backend.name(), code = error.code(), %error, "intent failed");
        }
        result
    }

    /// Opens a streamed execution of `key`.
    ///
    /// Only failures up to the first byte are returned here; see
    /// [`IntentStream::outcome`] for how the stream ended.
    pub async fn stream(
        &self,
        key: impl IntentKey,
        context: &Context,
        options: Option<RequestOptions>,
    ) -> Result<IntentStream, IntentError> {
        let intent = key.resolve()?;
        let options = options.unwrap_or_default();
        tracing::debug!(
            %intent,
            backend = self.backend.name(),
            model = %self.model_for(&options),
            records = context.dataset.len(),
            "streaming intent"
        );

        let stream = self.backend.stream_intent(intent, context, &options).await;
        if let Err(error) = &stream {
            tracing::warn!(%intent, backend = self.backend.name(), code = error.code(), %error, "intent stream failed to open");
        }
        stream
    }

    fn model_for<'a>(&'a self, options: &'a RequestOptions) -> &'a str {
        options
            .model
            .as_deref()
            .unwrap_or(&self.backend.defaults().model)
    }
}

impl Debug for IntentRunner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentRunner")
            .field("backend", &self.backend.name())
            .finish()
    }
}
