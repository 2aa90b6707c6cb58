//! Contract every hosted backend adapter must satisfy, exercised against a
//! scripted transport. The reqwest transport is only driven against a
//! loopback server.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use ferrosight_core::{
    AdapterConfig, Backend, BackendErrorKind, GeminiAdapter, GenerationDefaults, HttpError,
    HttpMethod, HttpResponse, Intent, IntentError, IntentExecutor, OpenAiAdapter, ReqwestHttpClient,
    RequestOptions, ScriptedHttpClient, ScriptedReply, StreamOutcome,
};
use serde_json::json;

use support::{serve_sse, spending_context, summary_document, SUMMARY_CHUNKS};

#[derive(Debug, Clone, Copy)]
enum Vendor {
    Gemini,
    OpenAi,
}

const VENDORS: [Vendor; 2] = [Vendor::Gemini, Vendor::OpenAi];

impl Vendor {
    fn backend(self, replies: Vec<ScriptedReply>) -> (Arc<dyn Backend>, Arc<ScriptedHttpClient>) {
        let http = Arc::new(ScriptedHttpClient::new(replies));
        let backend: Arc<dyn Backend> = match self {
            Self::Gemini => Arc::new(GeminiAdapter::with_http_client(
                AdapterConfig::new(
                    "contract-key",
                    "https://gemini.test/v1beta",
                    GenerationDefaults::new("gemini-contract"),
                ),
                http.clone(),
            )),
            Self::OpenAi => Arc::new(OpenAiAdapter::with_http_client(
                AdapterConfig::new(
                    "contract-key",
                    "https://openai.test/v1",
                    GenerationDefaults::new("gpt-contract"),
                ),
                http.clone(),
            )),
        };
        (backend, http)
    }

    fn name(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        }
    }

    /// Single-shot response body carrying `text` as the model output.
    fn completion(self, text: &str) -> ScriptedReply {
        let body = match self {
            Self::Gemini => json!({
                "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
            }),
            Self::OpenAi => json!({
                "choices": [{ "message": { "role": "assistant", "content": text } }]
            }),
        };
        ScriptedReply::Response(HttpResponse::ok_json(body.to_string()))
    }

    /// SSE body delivering each of `deltas` as one event.
    fn streamed(self, deltas: &[&str]) -> ScriptedReply {
        let mut frames: Vec<String> = deltas
            .iter()
            .map(|delta| {
                let event = match self {
                    Self::Gemini => json!({
                        "candidates": [{ "content": { "parts": [{ "text": delta }] } }]
                    }),
                    Self::OpenAi => json!({ "choices": [{ "delta": { "content": delta } }] }),
                };
                format!("data: {event}\n\n")
            })
            .collect();
        if matches!(self, Self::OpenAi) {
            frames.push(String::from("data: [DONE]\n\n"));
        }
        ScriptedReply::stream_text(frames)
    }

    fn status(self, status: u16) -> ScriptedReply {
        let body = json!({ "error": { "message": format!("status {status} from {}", self.name()) } });
        ScriptedReply::Response(HttpResponse {
            status,
            body: body.to_string(),
        })
    }
}

#[tokio::test]
async fn execute_issues_exactly_one_post() {
    for vendor in VENDORS {
        let (backend, http) = vendor.backend(vec![vendor.completion(&summary_document())]);

        let result = backend
            .execute_intent(Intent::Summarize, &spending_context(), &RequestOptions::default())
            .await
            .unwrap_or_else(|error| panic!("{vendor:?}: {error}"));

        assert_eq!(result.intent, Intent::Summarize);
        assert_eq!(result.confidence(), Some(0.9));
        let requests = http.requests();
        assert_eq!(requests.len(), 1, "{vendor:?}");
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(backend.name(), vendor.name());
    }
}

#[tokio::test]
async fn stream_terminal_matches_single_shot_result() {
    for vendor in VENDORS {
        let (backend, _) = vendor.backend(vec![
            vendor.completion(&summary_document()),
            vendor.streamed(&SUMMARY_CHUNKS),
        ]);
        let context = spending_context();
        let options = RequestOptions::default();

        let single = backend
            .execute_intent(Intent::Summarize, &context, &options)
            .await
            .expect("single shot");
        let summary = backend
            .stream_intent(Intent::Summarize, &context, &options)
            .await
            .expect("stream opens")
            .drain()
            .await;

        assert_eq!(summary.outcome, StreamOutcome::Complete, "{vendor:?}");
        assert_eq!(summary.terminal, Some(single), "{vendor:?}");
        let sequences: Vec<u64> = summary.partials.iter().map(|partial| partial.sequence).collect();
        assert_eq!(sequences, vec![1], "{vendor:?}");
    }
}

#[tokio::test]
async fn http_status_maps_to_backend_error_kind() {
    let cases = [
        (401, BackendErrorKind::Auth, false),
        (429, BackendErrorKind::RateLimited, true),
        (500, BackendErrorKind::Upstream, true),
    ];

    for vendor in VENDORS {
        for (status, kind, retryable) in cases {
            let (backend, _) = vendor.backend(vec![vendor.status(status)]);
            let error = backend
                .execute_intent(Intent::Explain, &spending_context(), &RequestOptions::default())
                .await
                .expect_err("status failure");

            let IntentError::Backend(cause) = &error else {
                panic!("{vendor:?} {status}: expected backend error, got {error:?}");
            };
            assert_eq!(cause.kind(), kind, "{vendor:?} {status}");
            assert_eq!(cause.status(), Some(status));
            assert_eq!(cause.retryable(), retryable);
            assert_eq!(cause.backend(), vendor.name());
        }
    }
}

#[tokio::test]
async fn transport_failure_is_a_transport_error() {
    for vendor in VENDORS {
        let (backend, _) =
            vendor.backend(vec![ScriptedReply::Error(HttpError::new("connection refused"))]);
        let error = backend
            .execute_intent(Intent::Cluster, &spending_context(), &RequestOptions::default())
            .await
            .expect_err("transport failure");

        assert_eq!(error.code(), "backend.transport", "{vendor:?}");
        assert!(error.retryable());
    }
}

#[tokio::test]
async fn unknown_intent_and_bad_options_send_nothing() {
    for vendor in VENDORS {
        let (backend, http) = vendor.backend(vec![vendor.completion(&summary_document())]);
        let context = spending_context();

        let error = backend
            .execute_intent("FOO", &context, &RequestOptions::default())
            .await
            .expect_err("unknown intent");
        assert!(matches!(error, IntentError::UnknownIntent { .. }));

        let error = backend
            .stream_intent("FOO", &context, &RequestOptions::default())
            .await
            .map(|_| ())
            .expect_err("unknown intent");
        assert!(matches!(error, IntentError::UnknownIntent { .. }));

        let error = backend
            .execute_intent(
                Intent::Summarize,
                &context,
                &RequestOptions::default().with_temperature(3.0),
            )
            .await
            .expect_err("invalid temperature");
        assert!(matches!(error, IntentError::InvalidOptions(_)));

        assert!(http.requests().is_empty(), "{vendor:?}");
    }
}

#[tokio::test]
async fn resolved_options_reach_the_wire() {
    for vendor in VENDORS {
        let (backend, http) = vendor.backend(vec![vendor.completion(&summary_document())]);
        let options = RequestOptions::default()
            .with_model("override-model")
            .with_temperature(0.7)
            .with_max_output_tokens(321)
            .with_system_prompt("Answer tersely.");

        backend
            .execute_intent(Intent::Summarize, &spending_context(), &options)
            .await
            .expect("result");

        let request = &http.requests()[0];
        let body: serde_json::Value =
            serde_json::from_str(request.body.as_deref().expect("json body")).expect("valid json");
        let rendered = body.to_string();
        // Gemini addresses the model in the URL, OpenAI in the body.
        assert!(
            request.url.contains("override-model") || rendered.contains("override-model"),
            "{vendor:?}"
        );
        assert!(rendered.contains("321"), "{vendor:?}: {rendered}");
        assert!(rendered.contains("Answer tersely."), "{vendor:?}");
        assert!(rendered.contains("Jan"), "{vendor:?}: prompt carries the dataset");
    }
}

#[tokio::test]
async fn stream_without_a_document_is_incomplete() {
    for vendor in VENDORS {
        let (backend, _) = vendor.backend(vec![vendor.streamed(&[SUMMARY_CHUNKS[0]])]);

        let summary = backend
            .stream_intent(Intent::Summarize, &spending_context(), &RequestOptions::default())
            .await
            .expect("stream opens")
            .drain()
            .await;

        assert!(summary.partials.is_empty());
        assert_eq!(
            summary.outcome,
            StreamOutcome::Incomplete {
                buffered_bytes: SUMMARY_CHUNKS[0].len()
            },
            "{vendor:?}"
        );
    }
}

#[tokio::test]
async fn slow_stream_over_http_completes_past_the_request_timeout() {
    let mut frames: Vec<String> = SUMMARY_CHUNKS
        .iter()
        .map(|delta| format!("data: {}\n\n", json!({ "choices": [{ "delta": { "content": delta } }] })))
        .collect();
    frames.push(String::from("data: [DONE]\n\n"));
    let endpoint = serve_sse(frames, Duration::from_millis(150)).await;

    let config = AdapterConfig::new("contract-key", endpoint, GenerationDefaults::new("gpt-contract"))
        .with_timeout_ms(300);
    let backend = OpenAiAdapter::with_http_client(config, Arc::new(ReqwestHttpClient::new()));

    let summary = backend
        .stream_intent(Intent::Summarize, &spending_context(), &RequestOptions::default())
        .await
        .expect("stream opens")
        .drain()
        .await;

    assert_eq!(summary.outcome, StreamOutcome::Complete);
    assert_eq!(
        summary.terminal.map(|result| result.value),
        Some(serde_json::from_str(&summary_document()).expect("document"))
    );
}
