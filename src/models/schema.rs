// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model registry schema
//!
//! Mirrors one entry of the remote model listing.

use serde::{Deserialize, Serialize};

/// Model definition with capability flags
///
/// The zero value (`ModelDefinition::default()`) stands for an unknown
/// model: empty name and every capability off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Model identifier, unique in the listing
    pub name: String,

    /// Short description of the model
    #[serde(default)]
    pub description: String,

    /// Upstream provider
    #[serde(default)]
    pub provider: String,

    /// Accepts image parts in user messages
    #[serde(default)]
    pub vision: bool,

    /// Emits an inline reasoning block before the answer
    #[serde(default)]
    pub reasoning: bool,

    /// Unfiltered model; never picked as the default
    #[serde(default)]
    pub uncensored: bool,

    /// Input modalities announced by newer listings (e.g. `["text", "image"]`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_modalities: Vec<String>,
}

impl ModelDefinition {
    /// Create a definition with every capability off
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder: set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Builder: set provider
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Builder: enable vision support
    pub fn with_vision(mut self) -> Self {
        self.vision = true;
        self
    }

    /// Builder: enable reasoning tags
    pub fn with_reasoning(mut self) -> Self {
        self.reasoning = true;
        self
    }

    /// Builder: mark as uncensored
    pub fn uncensored(mut self) -> Self {
        self.uncensored = true;
        self
    }

    /// Whether this is the "unknown model" value
    pub fn is_unknown(&self) -> bool {
        self.name.is_empty()
    }

    /// Whether image parts may be attached for this model
    pub fn supports_vision(&self) -> bool {
        self.vision || self.input_modalities.iter().any(|m| m == "image")
    }
}
