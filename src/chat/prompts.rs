// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! System prompt selection

use std::collections::BTreeMap;

use crate::config::settings::default_system_prompt;
use crate::config::Settings;

/// System prompts keyed by model name, with a fallback for everything else
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompts {
    default: String,
    per_model: BTreeMap<String, String>,
}

impl SystemPrompts {
    /// Table holding only the given default prompt
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            per_model: BTreeMap::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default: settings.prompts.default.clone(),
            per_model: settings.prompts.models.clone(),
        }
    }

    /// Builder: dedicated prompt for one model
    pub fn with_model_prompt(mut self, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.per_model.insert(model.into(), prompt.into());
        self
    }

    /// Prompt for `model`, or the default one for unrecognized models
    pub fn select(&self, model: &str) -> &str {
        self.per_model
            .get(model)
            .map(String::as_str)
            .unwrap_or(&self.default)
    }

    pub fn default_prompt(&self) -> &str {
        &self.default
    }
}

impl Default for SystemPrompts {
    fn default() -> Self {
        Self::new(default_system_prompt())
    }
}
