// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Polain
//!
//! Handles loading and saving settings from ~/.polain/settings.json

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod io;
mod merge;
mod validation;

/// Main settings structure, stored in ~/.polain/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Remote endpoints
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Default settings for new sessions
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Reasoning delimiter configuration
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// System prompts, keyed by model name
    #[serde(default)]
    pub prompts: PromptsConfig,
}

/// Remote endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Chat-completion endpoint (OpenAI-compatible, streamed)
    #[serde(default = "default_chat_url")]
    pub chat_url: String,

    /// Model listing endpoint
    #[serde(default = "default_models_url")]
    pub models_url: String,

    /// Timeout for connecting and receiving response headers, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Default settings for new sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Model used when none is selected explicitly
    #[serde(default = "default_model")]
    pub model: String,

    /// Ask the service not to publish the conversation
    #[serde(default = "default_true")]
    pub private: bool,

    /// Capacity of the hand-off channel between the network task and the consumer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Inline delimiters marking a reasoning block in the content stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasoningConfig {
    #[serde(default = "default_open_tag")]
    pub open_tag: String,

    #[serde(default = "default_close_tag")]
    pub close_tag: String,
}

/// System prompt table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Prompt used for models without a dedicated entry
    #[serde(default = "default_system_prompt")]
    pub default: String,

    /// Per-model prompt overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub models: BTreeMap<String, String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            chat_url: default_chat_url(),
            models_url: default_models_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            private: true,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            open_tag: default_open_tag(),
            close_tag: default_close_tag(),
        }
    }
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            default: default_system_prompt(),
            models: BTreeMap::new(),
        }
    }
}

fn default_chat_url() -> String {
    "https://text.pollinations.ai/openai".to_string()
}

fn default_models_url() -> String {
    "https://text.pollinations.ai/models".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_model() -> String {
    "openai".to_string()
}

fn default_true() -> bool {
    true
}

fn default_channel_capacity() -> usize {
    16
}

fn default_open_tag() -> String {
    "<think>".to_string()
}

fn default_close_tag() -> String {
    "</think>".to_string()
}

pub(crate) fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a very smart and helpful assistant.
You are able to answer any question and provide information on a wide range of topics.
You are also able to generate text in a variety of styles and formats, including poetry, prose, and technical writing.
You are always polite and respectful, and you strive to provide the best possible answers to your users' questions.

If the user asks for an image, build a pollinations URL from this template, using an URL encoded description
(translated to English if needed). Pick a reasonable width and height, or follow the user's requirements
(landscape, square or portrait, sides as powers of two), and use a random unsigned integer seed so that
a new image is generated every time:

![Image description](https://image.pollinations.ai/prompt/{description}?nologo=true&private=true&enhance=true&width={width}&height={height}&seed={seed})

You answer using markdown. Use the language of the user.
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.defaults.model, "openai");
        assert!(settings.defaults.private);
        assert_eq!(settings.defaults.channel_capacity, 16);
        assert_eq!(settings.reasoning.open_tag, "<think>");
        assert_eq!(settings.reasoning.close_tag, "</think>");
        assert!(settings.endpoints.chat_url.ends_with("/openai"));
        assert!(settings.endpoints.models_url.ends_with("/models"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"defaults": {"model": "mistral"}}"#).unwrap();
        assert_eq!(settings.defaults.model, "mistral");
        assert_eq!(settings.defaults.channel_capacity, 16);
        assert_eq!(settings.reasoning, ReasoningConfig::default());
        assert!(settings.prompts.default.contains("helpful assistant"));
    }

    #[test]
    fn test_prompt_overrides_deserialize() {
        let settings: Settings = serde_json::from_str(
            r#"{"prompts": {"models": {"deepseek-reasoning": "Think step by step."}}}"#,
        )
        .unwrap();
        assert_eq!(
            settings.prompts.models.get("deepseek-reasoning").map(String::as_str),
            Some("Think step by step.")
        );
    }
}
