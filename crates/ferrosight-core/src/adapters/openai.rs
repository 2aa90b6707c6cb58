use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{execute_checked, transport_error, AdapterConfig};
use crate::backend::{Backend, BackendError, BackendFuture, ChunkStream, GenerationRequest};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::options::GenerationDefaults;
use crate::sse::{text_deltas, SseEvent};

const NAME: &str = "openai";
const DONE_SENTINEL: &str = "[DONE]";

/// OpenAI chat-completions adapter with `json_schema` response format.
#[derive(Clone)]
pub struct OpenAiAdapter {
    config: AdapterConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OpenAiAdapter {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    pub fn new(config: AdapterConfig) -> Self {
        Self::with_http_client(config, Arc::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(config: AdapterConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn default_config(api_key: impl Into<String>) -> AdapterConfig {
        AdapterConfig::new(
            api_key,
            Self::DEFAULT_ENDPOINT,
            GenerationDefaults::new(Self::DEFAULT_MODEL),
        )
    }

    fn request(&self, request: &GenerationRequest, stream: bool) -> HttpRequest {
        tracing::debug!(backend = NAME, model = %request.model, stream, "sending openai request");

        HttpRequest::post_json(
            format!("{}/chat/completions", self.config.endpoint),
            request_body(request, stream).to_string(),
        )
        .with_auth(&HttpAuth::BearerToken(self.config.api_key.clone()))
        .with_timeout_ms(self.config.timeout_ms)
    }
}

impl Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Backend for OpenAiAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn defaults(&self) -> &GenerationDefaults {
        &self.config.defaults
    }

    fn generate<'a>(&'a self, request: GenerationRequest) -> BackendFuture<'a, String> {
        let http_request = self.request(&request, false);
        Box::pin(async move {
            let body = execute_checked(NAME, self.http_client.as_ref(), http_request).await?;
            let completion: ChatCompletion = serde_json::from_str(&body).map_err(|e| {
                BackendError::protocol(NAME, format!("failed to parse openai response: {e}"))
            })?;

            let message = completion
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message)
                .ok_or_else(|| BackendError::empty_payload(NAME))?;

            if let Some(refusal) = message.refusal {
                return Err(BackendError::upstream(NAME, format!("model refused: {refusal}")));
            }
            match message.content {
                Some(content) if !content.trim().is_empty() => Ok(content),
                _ => Err(BackendError::empty_payload(NAME)),
            }
        })
    }

    fn generate_stream<'a>(&'a self, request: GenerationRequest) -> BackendFuture<'a, ChunkStream> {
        let http_request = self.request(&request, true);
        Box::pin(async move {
            let response = self
                .http_client
                .execute_stream(http_request)
                .await
                .map_err(|error| transport_error(NAME, &error))?;

            if !response.is_success() {
                let status = response.status;
                let body = response.collect_text().await;
                return Err(BackendError::from_status(NAME, status, &body));
            }

            Ok(text_deltas(NAME, response.body, stream_delta))
        })
    }
}

fn request_body(request: &GenerationRequest, stream: bool) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": [
            { "role": "system", "content": request.system_prompt },
            { "role": "user", "content": request.prompt }
        ],
        "temperature": request.temperature,
        "max_tokens": request.max_output_tokens,
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": format!("{}_result", request.intent.as_str().to_ascii_lowercase()),
                "schema": request.schema,
                "strict": false
            }
        }
    });
    if stream {
        body["stream"] = Value::Bool(true);
    }
    body
}

fn stream_delta(event: &SseEvent) -> Result<Option<String>, BackendError> {
    if event.data.trim() == DONE_SENTINEL {
        return Ok(None);
    }
    let chunk: ChatCompletionChunk = serde_json::from_str(&event.data).map_err(|e| {
        BackendError::protocol(NAME, format!("failed to parse openai stream chunk: {e}"))
    })?;
    if let Some(error) = chunk.error {
        return Err(BackendError::upstream(NAME, error.message));
    }

    Ok(Some(
        chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .unwrap_or_default(),
    ))
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<VendorError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VendorError {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendErrorKind, IntentExecutor};
    use crate::context::Context;
    use crate::http_client::{HttpError, HttpResponse, ScriptedHttpClient, ScriptedReply};
    use crate::options::RequestOptions;
    use crate::{Intent, IntentError, StreamOutcome};
    use futures_util::StreamExt;

    fn adapter(replies: Vec<ScriptedReply>) -> (OpenAiAdapter, Arc<ScriptedHttpClient>) {
        let http = Arc::new(ScriptedHttpClient::new(replies));
        let config = AdapterConfig::new(
            "sk-test",
            "https://openai.test/v1",
            GenerationDefaults::new("gpt-test"),
        );
        (OpenAiAdapter::with_http_client(config, http.clone()), http)
    }

    fn completion(content: &str) -> HttpResponse {
        HttpResponse::ok_json(
            json!({
                "id": "chatcmpl-1",
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
            })
            .to_string(),
        )
    }

    fn delta(content: &str) -> String {
        let chunk = json!({ "choices": [{ "index": 0, "delta": { "content": content } }] });
        format!("data: {chunk}\n\n")
    }

    fn context() -> Context {
        Context::new(vec![json!({ "x": 1 }), json!({ "x": 4 })])
    }

    #[tokio::test]
    async fn generate_sends_chat_request_with_json_schema() {
        let payload = r#"{"clusters":[{"id":0,"label":"low","members":[0,1]}],"confidence":0.6}"#;
        let (adapter, http) = adapter(vec![ScriptedReply::Response(completion(payload))]);

        let result = adapter
            .execute_intent(
                "cluster",
                &context(),
                &RequestOptions::default().with_model("gpt-override"),
            )
            .await
            .expect("cluster result");
        assert_eq!(result.intent, Intent::Cluster);

        let request = &http.requests()[0];
        assert_eq!(request.url, "https://openai.test/v1/chat/completions");
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Bearer sk-test")
        );

        let body: Value =
            serde_json::from_str(request.body.as_deref().unwrap_or_default()).expect("json body");
        assert_eq!(body["model"], "gpt-override");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "cluster_result");
        assert!(body.get("stream").is_none());
    }

    #[tokio::test]
    async fn rate_limit_is_classified_and_retryable() {
        let (adapter, _) = adapter(vec![ScriptedReply::Response(HttpResponse {
            status: 429,
            body: String::from(r#"{"error":{"message":"Rate limit reached"}}"#),
        })]);
        let error = adapter
            .execute_intent(Intent::Summarize, &context(), &RequestOptions::default())
            .await
            .expect_err("rate limited");
        assert_eq!(error.code(), "backend.rate_limited");
        assert!(error.retryable());
    }

    #[tokio::test]
    async fn transport_failure_maps_to_transport_kind() {
        let (adapter, _) = adapter(vec![ScriptedReply::Error(HttpError::new("connection refused"))]);
        let error = adapter
            .execute_intent(Intent::Summarize, &context(), &RequestOptions::default())
            .await
            .expect_err("transport failure");
        assert!(matches!(
            error,
            IntentError::Backend(ref cause) if cause.kind() == BackendErrorKind::Transport
        ));
    }

    #[tokio::test]
    async fn undecodable_envelope_is_protocol_error() {
        let (adapter, _) = adapter(vec![ScriptedReply::Response(HttpResponse::ok_json("<html>"))]);
        let error = adapter
            .execute_intent(Intent::Summarize, &context(), &RequestOptions::default())
            .await
            .expect_err("protocol failure");
        assert_eq!(error.code(), "backend.protocol");
    }

    #[tokio::test]
    async fn stream_follows_deltas_until_done() {
        let (adapter, http) = adapter(vec![ScriptedReply::stream_text([
            delta("{\"summary\":\"Spending "),
            delta("rose\",\"keyPoints\":[\"Feb\"],"),
            format!("{}data: [DONE]\n\n", delta("\"confidence\":0.9}")),
        ])]);

        let summary = adapter
            .stream_intent(Intent::Summarize, &context(), &RequestOptions::default())
            .await
            .expect("stream")
            .drain()
            .await;

        assert_eq!(summary.outcome, StreamOutcome::Complete);
        let terminal = summary.terminal.expect("terminal");
        assert_eq!(terminal.value["summary"], "Spending rose");

        let body: Value = serde_json::from_str(http.requests()[0].body.as_deref().unwrap_or_default())
            .expect("json body");
        assert_eq!(body["stream"], true);
    }

    #[tokio::test]
    async fn stream_open_failure_is_reported_before_any_item() {
        let (adapter, _) = adapter(vec![ScriptedReply::Stream {
            status: 401,
            chunks: vec![br#"{"error":{"message":"Incorrect API key"}}"#.to_vec()],
        }]);
        let error = adapter
            .stream_intent(Intent::Summarize, &context(), &RequestOptions::default())
            .await
            .expect_err("auth failure");
        assert_eq!(error.code(), "backend.auth");
    }

    #[tokio::test]
    async fn stream_item_count_ignores_role_only_deltas() {
        let role_only = "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n";
        let (adapter, _) = adapter(vec![ScriptedReply::stream_text([
            role_only.to_string(),
            delta("{\"summary\":\"a\",\"keyPoints\":[],\"confidence\":1}"),
            String::from("data: [DONE]\n\n"),
        ])]);

        let stream = adapter
            .stream_intent(Intent::Summarize, &context(), &RequestOptions::default())
            .await
            .expect("stream");
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 1);
    }
}
