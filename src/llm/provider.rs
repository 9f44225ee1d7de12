// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat transport trait and request types
//!
//! Defines the abstraction between the conversation engine and the HTTP layer.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;

use crate::error::Result;
use crate::llm::message::Message;

/// Raw response body, delivered as the transport receives it.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Sends a chat request and exposes the streamed response body
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Transport name, for logging
    fn name(&self) -> &str;

    /// Send the request and return the live response body.
    ///
    /// Fails only for request construction or connection-level problems;
    /// errors after the body started arrive as items of the stream.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream>;
}

/// Outbound chat-completion request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    /// Always true for this client
    pub stream: bool,

    /// Ask the service not to publish the conversation
    pub private: bool,

    /// Model to use
    pub model: String,

    /// Full conversation, system prompt first
    pub messages: Vec<Message>,
}

impl ChatRequest {
    /// Create a new streaming request
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            stream: true,
            private: true,
            model: model.into(),
            messages,
        }
    }

    /// Set the private flag
    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_request_new() {
        let request = ChatRequest::new("openai", vec![Message::user("Hello")]);

        assert_eq!(request.model, "openai");
        assert!(request.stream);
        assert!(request.private);
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn test_chat_request_wire_shape() {
        let request = ChatRequest::new(
            "mistral",
            vec![Message::system("be nice"), Message::user("hi")],
        )
        .with_private(false);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "stream": true,
                "private": false,
                "model": "mistral",
                "messages": [
                    {"role": "system", "content": "be nice"},
                    {"role": "user", "content": "hi"}
                ]
            })
        );
    }
}
