use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{execute_checked, transport_error, AdapterConfig};
use crate::backend::{Backend, BackendError, BackendFuture, ChunkStream, GenerationRequest};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::options::GenerationDefaults;
use crate::sse::{text_deltas, SseEvent};

const NAME: &str = "gemini";

/// Google Gemini adapter (`generateContent` API).
#[derive(Clone)]
pub struct GeminiAdapter {
    config: AdapterConfig,
    http_client: Arc<dyn HttpClient>,
}

impl GeminiAdapter {
    pub const DEFAULT_ENDPOINT: &'static str = "https://generativelanguage.googleapis.com/v1beta";
    pub const DEFAULT_MODEL: &'static str = "gemini-2.5-flash";

    pub fn new(config: AdapterConfig) -> Self {
        Self::with_http_client(config, Arc::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(config: AdapterConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Config with the public endpoint and default model.
    pub fn default_config(api_key: impl Into<String>) -> AdapterConfig {
        AdapterConfig::new(
            api_key,
            Self::DEFAULT_ENDPOINT,
            GenerationDefaults::new(Self::DEFAULT_MODEL),
        )
    }

    fn request(&self, request: &GenerationRequest, stream: bool) -> HttpRequest {
        let url = if stream {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.config.endpoint, request.model
            )
        } else {
            format!("{}/models/{}:generateContent", self.config.endpoint, request.model)
        };

        let auth = HttpAuth::Header {
            name: String::from("x-goog-api-key"),
            value: self.config.api_key.clone(),
        };

        tracing::debug!(backend = NAME, model = %request.model, stream, "sending gemini request");

        HttpRequest::post_json(url, request_body(request).to_string())
            .with_auth(&auth)
            .with_timeout_ms(self.config.timeout_ms)
    }
}

impl Debug for GeminiAdapter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Backend for GeminiAdapter {
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
            let response: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
                BackendError::protocol(NAME, format!("failed to parse gemini response: {e}"))
            })?;
            response.into_text()
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

fn request_body(request: &GenerationRequest) -> Value {
    json!({
        "systemInstruction": {
            "parts": [{ "text": request.system_prompt }]
        },
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.prompt }]
        }],
        "generationConfig": {
            "temperature": request.temperature,
            "maxOutputTokens": request.max_output_tokens,
            "responseMimeType": "application/json",
            "responseSchema": to_openapi_schema(request.schema)
        }
    })
}

fn stream_delta(event: &SseEvent) -> Result<Option<String>, BackendError> {
    let chunk: GenerateContentResponse = serde_json::from_str(&event.data).map_err(|e| {
        BackendError::protocol(NAME, format!("failed to parse gemini stream chunk: {e}"))
    })?;
    if let Some(error) = chunk.error {
        return Err(BackendError::upstream(NAME, error.message));
    }
    Ok(Some(chunk.text()))
}

/// Keywords the response-schema dialect accepts besides `type`,
/// `properties` and `items`.
const PASSTHROUGH_KEYWORDS: [&str; 8] = [
    "description",
    "enum",
    "required",
    "minItems",
    "maxItems",
    "minimum",
    "maximum",
    "nullable",
];

/// Converts a JSON Schema into the OpenAPI subset accepted as
/// `responseSchema`: upper-case type names, unsupported keywords dropped.
pub fn to_openapi_schema(schema: &Value) -> Value {
    let Some(object) = schema.as_object() else {
        return schema.clone();
    };

    let mut converted = Map::new();
    for (key, value) in object {
        match key.as_str() {
            "type" => {
                if let Some(name) = value.as_str() {
                    converted.insert(key.clone(), Value::String(name.to_ascii_uppercase()));
                }
            }
            "properties" => {
                let properties = value
                    .as_object()
                    .map(|properties| {
                        properties
                            .iter()
                            .map(|(name, property)| (name.clone(), to_openapi_schema(property)))
                            .collect::<Map<String, Value>>()
                    })
                    .unwrap_or_default();
                converted.insert(key.clone(), Value::Object(properties));
            }
            "items" => {
                converted.insert(key.clone(), to_openapi_schema(value));
            }
            other if PASSTHROUGH_KEYWORDS.contains(&other) => {
                converted.insert(key.clone(), value.clone());
            }
            _ => {}
        }
    }
    Value::Object(converted)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<VendorError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VendorError {
    #[serde(default)]
    message: String,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    fn into_text(self) -> Result<String, BackendError> {
        if let Some(error) = &self.error {
            return Err(BackendError::upstream(NAME, error.message.clone()));
        }
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            return Err(BackendError::upstream(NAME, format!("prompt blocked: {reason}")));
        }

        let text = self.text();
        if text.trim().is_empty() {
            return Err(BackendError::empty_payload(NAME));
        }
        Ok(text)
    }
}
