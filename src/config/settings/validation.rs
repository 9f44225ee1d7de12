// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{PolainError, Result};

use super::Settings;

impl Settings {
    /// Check the settings for values the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.chat_url.trim().is_empty() {
            return Err(PolainError::Config("endpoints.chat_url is empty".into()));
        }
        if self.endpoints.models_url.trim().is_empty() {
            return Err(PolainError::Config("endpoints.models_url is empty".into()));
        }
        if self.defaults.channel_capacity == 0 {
            return Err(PolainError::Config(
                "defaults.channel_capacity must be at least 1".into(),
            ));
        }

        let open = &self.reasoning.open_tag;
        let close = &self.reasoning.close_tag;
        if open.is_empty() || close.is_empty() {
            return Err(PolainError::Config("reasoning tags must not be empty".into()));
        }
        if open == close {
            return Err(PolainError::Config(
                "reasoning open and close tags must differ".into(),
            ));
        }

        Ok(())
    }

    /// Model to use when the caller did not pick one, checking env var first.
    pub fn effective_model(&self) -> String {
        // Priority: env var > config file.
        std::env::var("POLAIN_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.defaults.model.clone())
    }
}
