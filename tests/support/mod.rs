#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ferrosight_core::{
    Backend, BackendError, BackendFuture, ChunkStream, Context, ContextMeta, GenerationDefaults,
    GenerationRequest,
};
use futures_util::stream;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// The SUMMARIZE response split the way a slow backend would deliver it.
pub const SUMMARY_CHUNKS: [&str; 3] = [
    r#"{"sum"#,
    r#"mary":"Spending ro"#,
    r#"se 25%","keyPoints":["Feb up from Jan"],"confidence":0.9}"#,
];

pub fn summary_document() -> String {
    SUMMARY_CHUNKS.concat()
}

pub fn spending_context() -> Context {
    Context::new(vec![
        json!({ "month": "Jan", "spending": 1200 }),
        json!({ "month": "Feb", "spending": 1500 }),
    ])
    .with_meta(ContextMeta::default().with_unit("USD").with_timeframe("monthly"))
}

/// In-memory backend that counts calls and replays a canned response.
pub struct ScriptedBackend {
    defaults: GenerationDefaults,
    payload: Result<String, BackendError>,
    chunks: Vec<Result<String, BackendError>>,
    generate_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new(payload: impl Into<String>) -> Self {
        let payload = payload.into();
        Self {
            defaults: GenerationDefaults::new("scripted-model"),
            chunks: vec![Ok(payload.clone())],
            payload: Ok(payload),
            generate_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: BackendError) -> Self {
        Self {
            payload: Err(error.clone()),
            chunks: vec![Err(error)],
            ..Self::new("")
        }
    }

    pub fn with_chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks = chunks.into_iter().map(|chunk| Ok(chunk.into())).collect();
        self
    }

    pub fn with_chunk_results(mut self, chunks: Vec<Result<String, BackendError>>) -> Self {
        self.chunks = chunks;
        self
    }

    pub fn with_defaults(mut self, defaults: GenerationDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst) + self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, request: GenerationRequest) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn defaults(&self) -> &GenerationDefaults {
        &self.defaults
    }

    fn generate<'a>(&'a self, request: GenerationRequest) -> BackendFuture<'a, String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.record(request);
        let payload = self.payload.clone();
        Box::pin(async move { payload })
    }

    fn generate_stream<'a>(&'a self, request: GenerationRequest) -> BackendFuture<'a, ChunkStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.record(request);
        let chunks = self.chunks.clone();
        Box::pin(async move {
            let chunks: ChunkStream = Box::pin(stream::iter(chunks));
            Ok(chunks)
        })
    }
}

pub fn shared(backend: ScriptedBackend) -> Arc<ScriptedBackend> {
    Arc::new(backend)
}

/// Serves one SSE response on a local port, sleeping `gap` before each
/// frame. Returns the base URL.
pub async fn serve_sse(frames: Vec<String>, gap: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        read_request(&mut socket).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n",
            )
            .await
            .expect("write head");
        for frame in frames {
            tokio::time::sleep(gap).await;
            socket.write_all(frame.as_bytes()).await.expect("write frame");
            socket.flush().await.expect("flush");
        }
        let _ = socket.shutdown().await;
    });
    format!("http://{address}/v1")
}

async fn read_request(socket: &mut TcpStream) {
    let mut received = Vec::new();
    let mut buffer = [0_u8; 1024];
    loop {
        let read = socket.read(&mut buffer).await.expect("read request");
        if read == 0 {
            return;
        }
        received.extend_from_slice(&buffer[..read]);
        let Some(end) = received.windows(4).position(|window| window == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&received[..end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if received.len() >= end + 4 + length {
            return;
        }
    }
}
