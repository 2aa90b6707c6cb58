use std::collections::{BTreeMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{stream, Stream, StreamExt};

/// Minimal HTTP method set needed by backend adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Authentication strategy applied to outgoing HTTP requests.
#[derive(Clone, PartialEq, Eq)]
pub enum HttpAuth {
    None,
    BearerToken(String),
    Header { name: String, value: String },
}

impl HttpAuth {
    pub fn apply(&self, headers: &mut BTreeMap<String, String>) {
        match self {
            Self::None => {}
            Self::BearerToken(token) => {
                headers.insert(String::from("authorization"), format!("Bearer {token}"));
            }
            Self::Header { name, value } => {
                headers.insert(name.to_ascii_lowercase(), value.clone());
            }
        }
    }
}

impl std::fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::BearerToken(_) => f.write_str("BearerToken(<redacted>)"),
            Self::Header { name, .. } => write!(f, "Header({name}: <redacted>)"),
        }
    }
}

/// HTTP request envelope used by adapter transport calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    /// Buffered calls: bound on the whole exchange. Streamed calls: bound on
    /// the wait for the response head and on each gap between body chunks.
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// POST with a JSON body and matching content type.
    pub fn post_json(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
            .with_header("content-type", "application/json")
            .with_body(body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_auth(mut self, auth: &HttpAuth) -> Self {
        auth.apply(&mut self.headers);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// HTTP response envelope returned by an adapter transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Raw body bytes in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, HttpError>> + Send>>;

/// Response whose body is consumed incrementally.
pub struct HttpStreamResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl HttpStreamResponse {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Buffers the remaining body as text, for error reporting.
    pub async fn collect_text(mut self) -> String {
        let mut bytes = Vec::new();
        while let Some(Ok(chunk)) = self.body.next().await {
            bytes.extend_from_slice(&chunk);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl std::fmt::Debug for HttpStreamResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStreamResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    retryable: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

pub type HttpFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, HttpError>> + Send + 'a>>;

/// Adapter transport contract: buffered and streaming execution.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a, HttpResponse>;

    fn execute_stream<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a, HttpStreamResponse>;
}

/// Production HTTP client using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(concat!("ferrosight/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Sends `request`. With `whole_response` the timeout covers the body
    /// too; otherwise it only bounds the wait for the response head.
    async fn send(
        &self,
        request: HttpRequest,
        whole_response: bool,
    ) -> Result<reqwest::Response, HttpError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let timeout = Duration::from_millis(request.timeout_ms);
        if whole_response {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        if whole_response {
            return builder.send().await.map_err(classify_reqwest_error);
        }
        match tokio::time::timeout(timeout, builder.send()).await {
            Ok(response) => response.map_err(classify_reqwest_error),
            Err(_) => Err(HttpError::new(format!(
                "request timeout: no response within {} ms",
                request.timeout_ms
            ))),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> HttpError {
    if error.is_timeout() {
        HttpError::new(format!("request timeout: {error}"))
    } else if error.is_connect() {
        HttpError::new(format!("connection failed: {error}"))
    } else if error.is_body() || error.is_decode() {
        HttpError::new(format!("failed to read response body: {error}"))
    } else if error.is_builder() {
        HttpError::non_retryable(format!("invalid request: {error}"))
    } else {
        HttpError::new(format!("request failed: {error}"))
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a, HttpResponse> {
        Box::pin(async move {
            let response = self.send(request, true).await?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(classify_reqwest_error)?;

            Ok(HttpResponse { status, body })
        })
    }

    fn execute_stream<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a, HttpStreamResponse> {
        Box::pin(async move {
            let idle = Duration::from_millis(request.timeout_ms);
            let response = self.send(request, false).await?;
            let status = response.status().as_u16();
            let chunks = response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(classify_reqwest_error));

            Ok(HttpStreamResponse {
                status,
                body: idle_timeout(Box::pin(chunks), idle),
            })
        })
    }
}

/// Fails the body once no chunk has arrived for `idle`. A steadily
/// producing stream is never cut off, however long it runs.
fn idle_timeout(body: ByteStream, idle: Duration) -> ByteStream {
    Box::pin(stream::unfold(Some(body), move |body| async move {
        let mut body = body?;
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some(body))),
            Ok(None) => None,
            Err(_) => Some((
                Err(HttpError::new(format!(
                    "stream idle: no data for {} ms",
                    idle.as_millis()
                ))),
                None,
            )),
        }
    }))
}

/// Canned reply served by [`ScriptedHttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Response(HttpResponse),
    /// Streamed body delivered as the given byte chunks.
    Stream { status: u16, chunks: Vec<Vec<u8>> },
    Error(HttpError),
}

impl ScriptedReply {
    /// 200 streamed body split at the given text boundaries.
    pub fn stream_text<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Stream {
            status: 200,
            chunks: chunks
                .into_iter()
                .map(|chunk| chunk.into().into_bytes())
                .collect(),
        }
    }
}

/// Deterministic offline transport: serves queued replies in order and
/// records every request it receives.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_reply(&self, request: HttpRequest) -> ScriptedReply {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                ScriptedReply::Error(HttpError::non_retryable("no scripted reply left"))
            })
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a, HttpResponse> {
        let reply = self.next_reply(request);
        Box::pin(async move {
            match reply {
                ScriptedReply::Response(response) => Ok(response),
                ScriptedReply::Stream { status, chunks } => Ok(HttpResponse {
                    status,
                    body: String::from_utf8_lossy(&chunks.concat()).into_owned(),
                }),
                ScriptedReply::Error(error) => Err(error),
            }
        })
    }

    fn execute_stream<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a, HttpStreamResponse> {
        let reply = self.next_reply(request);
        Box::pin(async move {
            let (status, chunks) = match reply {
                ScriptedReply::Response(response) => {
                    (response.status, vec![response.body.into_bytes()])
                }
                ScriptedReply::Stream { status, chunks } => (status, chunks),
                ScriptedReply::Error(error) => return Err(error),
            };

            let body: ByteStream = Box::pin(stream::iter(chunks.into_iter().map(Ok)));
            Ok(HttpStreamResponse { status, body })
        })
    }
}
