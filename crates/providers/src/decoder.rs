//! Decoding of the backend's streamed completion body.
//!
//! The body is a sequence of `data: <json>` lines closed by `data: [DONE]`.
//! [`ProtocolDecoder`] is the push-style core: feed it raw bytes, get typed
//! [`DecoderEvent`]s back. [`DeltaStream`] wraps a [`ByteStream`] with a
//! decoder and yields the same events lazily.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use hearth_domain::error::{Error, Result};
use hearth_domain::stream::DecoderEvent;
use serde_json::Value;

use crate::traits::ByteStream;

const DONE_MARKER: &str = "[DONE]";

/// Longest line the decoder buffers before giving up on the body.
pub const MAX_LINE_BYTES: usize = 1 << 20;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Push decoder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Line-oriented decoder for one completion body.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters and lines split across transport chunks decode intact. Once
/// the terminal marker has been seen the decoder ignores further input.
#[derive(Debug, Default)]
pub struct ProtocolDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    content: String,
    reasoning: String,
    finished: bool,
}

impl ProtocolDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a transport chunk. Returns the events for every complete line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<DecoderEvent>> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(rel) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + rel;
            let line = String::from_utf8_lossy(&self.buffer[start..=end]).into_owned();
            start = end + 1;
            self.scanned = start;
            self.decode_line(&line, &mut events);
            if self.finished {
                self.buffer.clear();
                self.scanned = 0;
                return events;
            }
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > MAX_LINE_BYTES {
            tracing::warn!(buffered = self.buffer.len(), "stream line too long, abandoning body");
            self.finished = true;
            self.buffer.clear();
            self.scanned = 0;
            events.push(Err(Error::Provider {
                provider: "backend".into(),
                message: format!("stream line exceeds {MAX_LINE_BYTES} bytes"),
            }));
        }
        events
    }

    /// Signal the end of the body: flush a trailing partial line and emit
    /// `Done` if the terminal marker never arrived.
    pub fn finish(&mut self) -> Vec<Result<DecoderEvent>> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.scanned = 0;
            self.decode_line(&String::from_utf8_lossy(&rest), &mut events);
        }
        if !self.finished {
            self.finished = true;
            events.push(Ok(DecoderEvent::Done));
        }
        events
    }

    /// Answer text accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Reasoning text accumulated so far.
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn decode_line(&mut self, line: &str, events: &mut Vec<Result<DecoderEvent>>) {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return;
        }
        // `event:`, `id:` and `retry:` carry nothing we use.
        let Some(payload) = line.strip_prefix("data:") else {
            return;
        };
        let payload = payload.trim();
        if payload.is_empty() {
            return;
        }
        if payload == DONE_MARKER {
            self.finished = true;
            events.push(Ok(DecoderEvent::Done));
            return;
        }

        let value: Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed stream payload");
                return;
            }
        };

        if let Some(err) = value.get("error") {
            self.finished = true;
            events.push(Err(in_band_error(err)));
            return;
        }

        let Some(delta) = value.pointer("/choices/0/delta") else {
            return;
        };
        if let Some(text) = non_empty_str(delta.get("reasoning_content")) {
            self.reasoning.push_str(text);
            events.push(Ok(DecoderEvent::ReasoningDelta {
                text: text.to_owned(),
            }));
        }
        if let Some(text) = non_empty_str(delta.get("content")) {
            self.content.push_str(text);
            events.push(Ok(DecoderEvent::ContentDelta {
                text: text.to_owned(),
            }));
        }
    }
}

fn non_empty_str(v: Option<&Value>) -> Option<&str> {
    v.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn in_band_error(err: &Value) -> Error {
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| err.as_str())
        .unwrap_or("unknown backend error")
        .to_owned();
    Error::Provider {
        provider: "backend".into(),
        message,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lazy, finite sequence of decoder events over a completion body.
///
/// Ends after `Done` or after the first error. Dropping it drops the
/// underlying body and with it the connection.
pub struct DeltaStream {
    body: ByteStream,
    decoder: ProtocolDecoder,
    queued: VecDeque<Result<DecoderEvent>>,
    ended: bool,
}

impl DeltaStream {
    pub fn new(body: ByteStream) -> Self {
        Self {
            body,
            decoder: ProtocolDecoder::new(),
            queued: VecDeque::new(),
            ended: false,
        }
    }

    pub fn content(&self) -> &str {
        self.decoder.content()
    }

    pub fn reasoning(&self) -> &str {
        self.decoder.reasoning()
    }

    fn enqueue(&mut self, events: Vec<Result<DecoderEvent>>) {
        for event in events {
            if event.is_err() {
                self.ended = true;
            }
            self.queued.push_back(event);
        }
        if self.decoder.is_finished() {
            self.ended = true;
        }
    }
}

impl Stream for DeltaStream {
    type Item = Result<DecoderEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.queued.pop_front() {
                return Poll::Ready(Some(event));
            }
            if this.ended {
                return Poll::Ready(None);
            }
            match this.body.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(chunk))) => {
                    let events = this.decoder.push(&chunk);
                    this.enqueue(events);
                }
                Poll::Ready(Some(Err(e))) => {
                    this.ended = true;
                    this.queued.push_back(Err(e));
                }
                Poll::Ready(None) => {
                    let events = this.decoder.finish();
                    this.enqueue(events);
                    this.ended = true;
                }
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
