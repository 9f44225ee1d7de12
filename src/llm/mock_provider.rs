// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock chat transport for testing
//!
//! Replays scripted response bodies so the conversation engine can be
//! exercised without making real API calls.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ApiError, PolainError, Result};
use crate::llm::provider::{ByteStream, ChatRequest, ChatTransport};

/// A mock transport for testing
#[derive(Clone, Default)]
pub struct MockTransport {
    /// Scripted responses, consumed in order; the last one repeats
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// Call counter
    call_count: Arc<AtomicUsize>,
    /// Recorded requests
    recorded_requests: Arc<Mutex<Vec<ChatRequest>>>,
}

/// A pre-configured response body
#[derive(Clone, Debug, Default)]
pub struct MockResponse {
    /// Body chunks, delivered one stream item each
    pub chunks: Vec<Bytes>,
    /// Fail `open_stream` with a network error instead of answering
    pub connect_error: Option<String>,
    /// Fail the body with a stream error after all chunks were sent
    pub stream_error: Option<String>,
    /// Never finish the body after the chunks were sent
    pub hang: bool,
}

impl MockResponse {
    /// Body made of the given raw chunks
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks
                .into_iter()
                .map(|c| Bytes::from(c.into().into_bytes()))
                .collect(),
            ..Default::default()
        }
    }

    /// One SSE event per content delta, followed by a `stop` finish event.
    pub fn deltas(id: &str, deltas: &[&str]) -> Self {
        let mut events: Vec<String> = deltas.iter().map(|d| sse_delta(id, d)).collect();
        events.push(sse_finish(id, "stop"));
        Self::chunks(events)
    }

    /// Keep the body open after the scripted chunks
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Fail the body after the scripted chunks
    pub fn with_stream_error(mut self, message: impl Into<String>) -> Self {
        self.stream_error = Some(message.into());
        self
    }

    /// Fail before any byte is received
    pub fn connect_error(message: impl Into<String>) -> Self {
        Self {
            connect_error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Format a content delta as an SSE `data:` event.
pub fn sse_delta(id: &str, content: &str) -> String {
    let payload = serde_json::json!({
        "id": id,
        "choices": [{"delta": {"content": content}, "finish_reason": null}]
    });
    format!("data: {}\n\n", payload)
}

/// Format a terminal SSE event carrying a finish reason.
pub fn sse_finish(id: &str, reason: &str) -> String {
    let payload = serde_json::json!({
        "id": id,
        "choices": [{"delta": {}, "finish_reason": reason}]
    });
    format!("data: {}\n\n", payload)
}

impl MockTransport {
    /// Create a mock transport answering with an empty body
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call with this response
    pub fn with_response(self, response: MockResponse) -> Self {
        self.with_responses(vec![response])
    }

    /// Queue multiple responses (returned in order)
    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        *lock(&self.responses) = responses;
        self
    }

    /// Number of `open_stream` calls so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received so far
    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        lock(&self.recorded_requests).clone()
    }

    fn next_response(&self) -> MockResponse {
        let mut responses = lock(&self.responses);
        if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses.first().cloned().unwrap_or_default()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock transport lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.recorded_requests).push(request.clone());

        let response = self.next_response();
        if let Some(message) = response.connect_error {
            return Err(PolainError::Api(ApiError::Network(message)));
        }

        let body = stream::iter(response.chunks.into_iter().map(Ok));
        let tail: ByteStream = match (response.stream_error, response.hang) {
            (Some(message), _) => Box::pin(stream::once(async move {
                Err(PolainError::Api(ApiError::StreamError(message)))
            })),
            (None, true) => Box::pin(stream::pending()),
            (None, false) => Box::pin(stream::empty()),
        };

        Ok(Box::pin(body.chain(tail)))
    }
}
