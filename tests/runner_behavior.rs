mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ferrosight_core::{
    build_prompt, schema_for, ChunkStream, Context, ContextMeta, GenerationDefaults, Intent,
    IntentError, IntentRunner, IntentStream, RequestOptions,
};
use futures_util::{stream, StreamExt};
use serde_json::json;

use support::{spending_context, summary_document, ScriptedBackend, SUMMARY_CHUNKS};

fn rich_context() -> Context {
    Context::new(vec![
        json!({ "day": "Mon", "latency": 120.5, "region": "eu" }),
        json!({ "day": "Tue", "latency": 480.0, "region": "eu" }),
        json!({ "day": "Wed", "latency": 130.25, "region": "us" }),
    ])
    .with_selection(json!({ "day": "Tue", "latency": 480.0 }))
    .with_meta(
        ContextMeta::default()
            .with_timeframe("daily")
            .with_unit("ms")
            .with_category("infra")
            .with_data_type("timeseries"),
    )
}

#[test]
fn prompts_are_deterministic_for_every_intent() {
    for intent in Intent::ALL {
        let first = build_prompt(intent, &rich_context()).expect("prompt");
        let second = build_prompt(intent, &rich_context().clone()).expect("prompt");
        assert_eq!(first, second, "{intent} prompt differs between calls");
        assert!(first.contains(intent.as_str()));
    }
}

#[test]
fn string_keys_resolve_like_typed_intents() {
    let context = spending_context();
    assert_eq!(
        build_prompt("summarize", &context).expect("string key"),
        build_prompt(Intent::Summarize, &context).expect("typed key")
    );
    assert_eq!(
        schema_for("Detect-Anomaly").expect("relaxed name"),
        schema_for(Intent::DetectAnomaly).expect("typed key")
    );
}

#[test]
fn unknown_intent_fails_prompt_and_schema_lookup() {
    let context = spending_context();
    assert_eq!(
        build_prompt("FOO", &context),
        Err(IntentError::unknown_intent("FOO"))
    );
    assert!(matches!(schema_for("FOO"), Err(IntentError::UnknownIntent { .. })));
}

#[tokio::test]
async fn unknown_intent_never_reaches_the_backend() {
    let backend = Arc::new(ScriptedBackend::new(summary_document()));
    let runner = IntentRunner::new(backend.clone());
    let context = Context::new(vec![json!({ "value": 3 }), json!({ "value": 300 })]);

    let error = runner
        .run("FOO", &context, None)
        .await
        .expect_err("unknown intent");
    assert!(matches!(error, IntentError::UnknownIntent { ref name } if name == "FOO"));

    let error = runner
        .stream("FOO", &context, None)
        .await
        .expect_err("unknown intent");
    assert!(matches!(error, IntentError::UnknownIntent { .. }));

    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn per_call_options_override_backend_defaults() {
    let defaults = GenerationDefaults::new("default-model")
        .with_temperature(0.1)
        .with_max_output_tokens(512);
    let backend = Arc::new(ScriptedBackend::new(summary_document()).with_defaults(defaults));
    let runner = IntentRunner::new(backend.clone());

    runner
        .run(
            Intent::Summarize,
            &spending_context(),
            Some(
                RequestOptions::default()
                    .with_model("override-model")
                    .with_temperature(1.1),
            ),
        )
        .await
        .expect("result");
    runner
        .run(Intent::Summarize, &spending_context(), None)
        .await
        .expect("result");

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].model, "override-model");
    assert_eq!(requests[0].temperature, 1.1);
    assert_eq!(requests[0].max_output_tokens, 512);
    assert_eq!(requests[1].model, "default-model");
    assert_eq!(requests[1].temperature, 0.1);
    assert_eq!(requests[1].schema, schema_for(Intent::Summarize).expect("schema"));
}

#[tokio::test]
async fn concurrent_runs_do_not_interact() {
    let backend = Arc::new(ScriptedBackend::new(summary_document()).with_chunks(SUMMARY_CHUNKS));
    let runner = IntentRunner::new(backend.clone());
    let context = spending_context();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let runner = runner.clone();
            let context = context.clone();
            tokio::spawn(async move {
                let ran = runner.run(Intent::Summarize, &context, None).await;
                let streamed = match runner.stream(Intent::Summarize, &context, None).await {
                    Ok(stream) => stream.drain().await.terminal,
                    Err(_) => None,
                };
                (ran, streamed)
            })
        })
        .collect();

    for task in tasks {
        let (ran, streamed) = task.await.expect("task completes");
        let ran = ran.expect("run result");
        assert_eq!(streamed, Some(ran));
    }
    assert_eq!(backend.generate_calls(), 8);
    assert_eq!(backend.stream_calls(), 8);
}

struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn dropping_a_stream_early_releases_the_source() {
    let released = Arc::new(AtomicBool::new(false));
    let guard = ReleaseFlag(released.clone());

    let chunks: ChunkStream = Box::pin(
        stream::iter(vec![String::from("[1]"), String::from(" "), String::from("oops")]).map(
            move |chunk| {
                let _held = &guard;
                Ok(chunk)
            },
        ),
    );
    let mut stream = IntentStream::from_chunks(Intent::Cluster, chunks);

    let first = stream.next().await.expect("first partial");
    assert_eq!(first.value, json!([1]));
    assert!(!released.load(Ordering::SeqCst));
    assert!(stream.outcome().is_none());

    drop(stream);
    assert!(released.load(Ordering::SeqCst));
}
