// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Server-sent event decoding
//!
//! Turns the raw response body into [`StreamChunk`]s. Lines are framed on
//! bytes before UTF-8 decoding, so a multi-byte character split across two
//! network reads is reassembled instead of being mangled.

use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::chat::streaming::StreamChunk;
use crate::error::{PolainError, Result};
use crate::llm::provider::ByteStream;

const DATA_PREFIX: &[u8] = b"data:";
const DONE_SENTINEL: &str = "[DONE]";
const DEFAULT_MAX_LINE_LEN: usize = 1 << 20;

/// Incremental decoder for an OpenAI-style event stream
#[derive(Debug)]
pub struct StreamDecoder {
    /// Bytes of the current, not yet terminated line
    buffer: Vec<u8>,
    /// Length of the buffer prefix already searched for a newline
    scanned: usize,
    /// Skipping the rest of an oversized line
    discarding: bool,
    max_line_len: usize,
    /// Set once a finish reason (or `[DONE]`) was seen
    finished: bool,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            discarding: false,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            finished: false,
        }
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines longer than this are logged and dropped
    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    /// Whether the stream has logically ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw bytes; returns the chunks completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        if self.finished {
            return chunks;
        }

        self.buffer.extend_from_slice(bytes);
        let mut start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let line_end = self.scanned + offset;
            if self.discarding {
                self.discarding = false;
            } else if let Some(chunk) =
                Self::decode_line(&self.buffer[start..line_end], &mut self.finished)
            {
                chunks.push(chunk);
            }
            start = line_end + 1;
            self.scanned = start;
            if self.finished {
                break;
            }
        }

        if self.finished {
            self.buffer.clear();
        } else {
            self.buffer.drain(..start);
            if self.discarding {
                self.buffer.clear();
            } else if self.buffer.len() > self.max_line_len {
                let err = PolainError::Decode(format!(
                    "event line exceeds {} bytes",
                    self.max_line_len
                ));
                tracing::warn!("Skipping event: {}", err);
                self.buffer.clear();
                self.discarding = true;
            }
        }
        self.scanned = self.buffer.len();
        chunks
    }

    /// Decode whatever is left once the body ended without a final newline.
    pub fn finish(&mut self) -> Vec<StreamChunk> {
        let line = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if self.finished || self.discarding || line.is_empty() {
            return Vec::new();
        }
        Self::decode_line(&line, &mut self.finished).into_iter().collect()
    }

    fn decode_line(line: &[u8], finished: &mut bool) -> Option<StreamChunk> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        // Comments, keep-alives, `event:`/`id:` lines carry no payload.
        let payload = line.strip_prefix(DATA_PREFIX)?;
        let payload = payload.strip_prefix(b" ").unwrap_or(payload);

        let payload = match std::str::from_utf8(payload) {
            Ok(text) => text.trim(),
            Err(e) => {
                let err = PolainError::Decode(format!("invalid UTF-8 in event: {}", e));
                tracing::warn!("Skipping event: {}", err);
                return None;
            }
        };

        if payload == DONE_SENTINEL {
            tracing::debug!("stream done sentinel received");
            *finished = true;
            return None;
        }

        let wire: WireChunk = match serde_json::from_str(payload) {
            Ok(wire) => wire,
            Err(e) => {
                let err = PolainError::Decode(format!("{} in payload {:?}", e, payload));
                tracing::warn!("Skipping event: {}", err);
                return None;
            }
        };

        // No choices: heartbeat.
        let choice = wire.choices.into_iter().next()?;
        let content = choice.delta.content.unwrap_or_default();

        if let Some(reason) = choice.finish_reason.filter(|r| !r.is_empty()) {
            tracing::debug!(id = %wire.id, reason = %reason, "stream finished");
            *finished = true;
            return Some(StreamChunk::new(wire.id, content).with_finish_reason(reason));
        }

        if content.is_empty() {
            // Role-only or empty envelope, nothing to forward.
            return None;
        }

        Some(StreamChunk::new(wire.id, content))
    }
}

/// Decode a live response body into chunks.
///
/// The returned stream is lazy and single-pass. It ends after the chunk
/// carrying a finish reason, at `[DONE]`, at the end of the body, or right
/// after yielding a transport error. Dropping it drops the body, which
/// closes the underlying connection.
pub fn decode_stream(mut body: ByteStream) -> impl Stream<Item = Result<StreamChunk>> + Send {
    async_stream::stream! {
        let mut decoder = StreamDecoder::new();
        let mut failed = false;
        while let Some(item) = body.next().await {
            match item {
                Ok(bytes) => {
                    for chunk in decoder.push(&bytes) {
                        yield Ok(chunk);
                    }
                    if decoder.is_finished() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Response body failed: {}", e);
                    failed = true;
                    yield Err(e);
                    break;
                }
            }
        }
        if !failed {
            for chunk in decoder.finish() {
                yield Ok(chunk);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    id: String,
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: WireDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    content: Option<String>,
}
