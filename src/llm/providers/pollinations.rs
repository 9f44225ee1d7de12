// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Pollinations text API transport
//!
//! Posts OpenAI-compatible chat requests and hands back the raw
//! server-sent-event body for decoding.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{ApiError, PolainError, Result};
use crate::llm::provider::{ByteStream, ChatRequest, ChatTransport};

const POLLINATIONS_CHAT_URL: &str = "https://text.pollinations.ai/openai";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP transport for the Pollinations chat endpoint
pub struct PollinationsTransport {
    client: Client,
    url: String,
    timeout: Duration,
}

impl PollinationsTransport {
    /// Create a transport for the public endpoint
    pub fn new() -> Self {
        Self::with_url(POLLINATIONS_CHAT_URL)
    }

    /// Create a transport for a custom endpoint
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a transport from the endpoint settings
    pub fn from_settings(settings: &Settings) -> Self {
        let timeout = Duration::from_secs(settings.endpoints.request_timeout_secs);
        Self {
            client: build_client(timeout),
            url: settings.endpoints.chat_url.clone(),
            timeout,
        }
    }

    /// Set the time allowed to receive response headers
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self.timeout = timeout;
        self
    }

    /// Endpoint this transport posts to
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for PollinationsTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn build_client(connect_timeout: Duration) -> Client {
    // No overall request timeout: it would also cut off long streamed bodies.
    Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        })
}

#[async_trait]
impl ChatTransport for PollinationsTransport {
    fn name(&self) -> &str {
        "pollinations"
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        tracing::debug!(
            url = %self.url,
            model = %request.model,
            messages = request.messages.len(),
            "opening chat stream"
        );

        let send = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send();

        let response = match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result.map_err(ApiError::from)?,
            Err(_) => return Err(PolainError::Api(ApiError::Timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PolainError::Api(ApiError::ServerError {
                status: status.as_u16(),
                message: body,
            }));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| PolainError::Api(ApiError::StreamError(e.to_string()))));

        Ok(Box::pin(body))
    }
}
