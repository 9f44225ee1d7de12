// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model registry loader
//!
//! Fetches the remote model listing once and serves capability lookups
//! from memory afterwards.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::OnceCell;

use crate::config::Settings;
use crate::error::{PolainError, Result};

use super::schema::ModelDefinition;

const POLLINATIONS_MODELS_URL: &str = "https://text.pollinations.ai/models";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(300);

/// Registry of the models offered by the chat service
#[derive(Debug)]
pub struct ModelRegistry {
    client: Client,
    /// Listing endpoint
    url: String,
    /// Populated at most once; stays empty when every load failed
    models: OnceCell<Vec<ModelDefinition>>,
    /// Minimum wait after a failed fetch before the next one
    retry_backoff: Duration,
    last_failure: Mutex<Option<Instant>>,
}

impl ModelRegistry {
    /// Create an empty registry for the public listing endpoint
    pub fn new() -> Self {
        Self::with_url(POLLINATIONS_MODELS_URL)
    }

    /// Create an empty registry for a custom listing endpoint
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: build_client(DEFAULT_TIMEOUT),
            url: url.into(),
            models: OnceCell::new(),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            last_failure: Mutex::new(None),
        }
    }

    /// Create an empty registry from the endpoint settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_url(settings.endpoints.models_url.clone())
            .with_timeout(Duration::from_secs(settings.endpoints.request_timeout_secs))
    }

    /// Create a registry that is already populated (no network access)
    pub fn from_models(models: Vec<ModelDefinition>) -> Self {
        Self {
            models: OnceCell::new_with(Some(models)),
            ..Self::with_url(String::new())
        }
    }

    /// Set the time allowed for the whole listing request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    /// Set how long a failed fetch keeps the registry from trying again
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Load the listing, or return the cached one.
    ///
    /// Concurrent callers share a single fetch. A failed fetch leaves the
    /// registry empty; calls within the retry backoff fail fast without
    /// touching the network.
    pub async fn load(&self) -> Result<&[ModelDefinition]> {
        if let Some(models) = self.models.get() {
            return Ok(models.as_slice());
        }
        if let Some(wait) = self.backoff_remaining() {
            return Err(PolainError::Fetch(format!(
                "model listing unavailable, next attempt in {}s",
                wait.as_secs()
            )));
        }

        let models = self
            .models
            .get_or_try_init(|| async {
                let fetched = self.fetch().await;
                if let Err(ref e) = fetched {
                    tracing::warn!(url = %self.url, "Failed to load model listing: {}", e);
                    *self.failure_slot() = Some(Instant::now());
                }
                fetched
            })
            .await?;
        Ok(models.as_slice())
    }

    fn failure_slot(&self) -> MutexGuard<'_, Option<Instant>> {
        self.last_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn backoff_remaining(&self) -> Option<Duration> {
        let failed_at = (*self.failure_slot())?;
        self.retry_backoff
            .checked_sub(failed_at.elapsed())
            .filter(|wait| !wait.is_zero())
    }

    async fn fetch(&self) -> Result<Vec<ModelDefinition>> {
        tracing::debug!(url = %self.url, "fetching model listing");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PolainError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PolainError::Fetch(format!(
                "listing returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PolainError::Fetch(e.to_string()))?;
        let models: Vec<ModelDefinition> = serde_json::from_str(&body)
            .map_err(|e| PolainError::Fetch(format!("invalid listing body: {}", e)))?;

        tracing::debug!(count = models.len(), "model listing loaded");
        Ok(models)
    }

    /// Whether the listing has been loaded
    pub fn is_loaded(&self) -> bool {
        self.models.initialized()
    }

    /// Loaded models, empty before a successful load
    pub fn models(&self) -> &[ModelDefinition] {
        self.models.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find a model by name.
    ///
    /// Never fails: an unknown name (or an unloaded registry) yields the
    /// zero-value definition, whose capabilities are all off.
    pub fn lookup(&self, name: &str) -> ModelDefinition {
        self.models()
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .unwrap_or_default()
    }

    /// First model of the listing that is not flagged uncensored
    pub fn default_model(&self) -> Option<&ModelDefinition> {
        self.models().iter().find(|m| !m.uncensored)
    }
}

fn build_client(timeout: Duration) -> Client {
    // The listing is small, so the timeout covers the whole request.
    Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        })
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
