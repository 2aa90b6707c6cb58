//! Server-sent events decoding for streaming backends.
//!
//! Both supported vendors stream their responses as SSE: frames separated by
//! a blank line, each carrying one or more `data:` lines. [`SseDecoder`]
//! reassembles frames across arbitrary byte boundaries and [`text_deltas`]
//! turns a byte body into the text-delta [`ChunkStream`] a
//! [`Backend`](crate::Backend) hands to the assembler.

use std::collections::VecDeque;

use futures_util::{stream, StreamExt};

use crate::backend::{BackendError, ChunkStream};
use crate::http_client::ByteStream;

/// One decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE frame decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every frame completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending
            .extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_frame_end(&self.pending) {
            let frame: Vec<u8> = self.pending.drain(..end + 2).collect();
            if let Some(event) = parse_frame(&frame[..end]) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever is left once the body has ended without a trailing
    /// blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let frame = std::mem::take(&mut self.pending);
        parse_frame(&frame)
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

fn parse_frame(frame: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(frame);
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "data" => data.push(value),
            "event" => event = Some(value.to_string()),
            _ => {}
        }
    }

    if data.is_empty() && event.is_none() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

struct DeltaState<F> {
    backend: String,
    body: ByteStream,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    extract: F,
    done: bool,
}

/// Maps an SSE byte body to text deltas.
///
/// `extract` turns one event's data into `Some(text)`, or `None` when the
/// event is the vendor's end-of-stream sentinel. Events yielding empty text
/// are skipped. The first error ends the stream.
pub fn text_deltas<F>(backend: impl Into<String>, body: ByteStream, extract: F) -> ChunkStream
where
    F: FnMut(&SseEvent) -> Result<Option<String>, BackendError> + Send + 'static,
{
    let state = DeltaState {
        backend: backend.into(),
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        extract,
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.ready.pop_front() {
                return Some((Ok(text), state));
            }
            if state.done {
                return None;
            }

            let events = match state.body.next().await {
                Some(Ok(bytes)) => state.decoder.push(&bytes),
                Some(Err(error)) => {
                    state.done = true;
                    let error = BackendError::transport(&state.backend, error.message());
                    return Some((Err(error), state));
                }
                None => {
                    state.done = true;
                    state.decoder.finish().into_iter().collect()
                }
            };

            for event in &events {
                match (state.extract)(event) {
                    Ok(Some(text)) if !text.is_empty() => state.ready.push_back(text),
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        state.done = true;
                        break;
                    }
                    Err(error) => {
                        state.done = true;
                        state.ready.clear();
                        return Some((Err(error), state));
                    }
                }
            }
        }
    }))
}
