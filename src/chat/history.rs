// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation history
//!
//! [`History`] is the ordered message list of one conversation. It keeps a
//! single invariant: when non-empty, the first message is the system prompt,
//! and no other system message exists. [`HistoryManager`] pairs it with the
//! prompt table so the right system prompt is injected for each model.

use crate::llm::message::{Message, MessageContent, Role};

use super::prompts::SystemPrompts;

/// Ordered, role-tagged message list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a message list handed back by a caller.
    ///
    /// A leading system message is kept; system messages anywhere else would
    /// break the invariant and are dropped.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut kept = Vec::with_capacity(messages.len());
        for (i, message) in messages.into_iter().enumerate() {
            if i > 0 && message.role == Role::System {
                tracing::warn!(position = i, "Dropping misplaced system message");
                continue;
            }
            kept.push(message);
        }
        Self { messages: kept }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether the history starts with a system message
    pub fn has_system_prompt(&self) -> bool {
        self.messages
            .first()
            .map(|m| m.role == Role::System)
            .unwrap_or(false)
    }

    /// Put `prompt` in front unless a system message is already there.
    ///
    /// Returns whether a message was inserted.
    pub fn ensure_system_prompt(&mut self, prompt: &str) -> bool {
        if self.has_system_prompt() {
            return false;
        }
        self.messages.insert(0, Message::system(prompt));
        true
    }

    /// Append a user turn; no deduplication, no trimming
    pub fn push_user(&mut self, content: impl Into<MessageContent>) {
        self.messages.push(Message::user(content));
    }

    /// Append an assistant turn
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Owner of the history of one conversation
#[derive(Debug, Clone, Default)]
pub struct HistoryManager {
    history: History,
    prompts: SystemPrompts,
}

impl HistoryManager {
    pub fn new(prompts: SystemPrompts) -> Self {
        Self {
            history: History::new(),
            prompts,
        }
    }

    /// Make sure the history starts with the system prompt selected for `model`.
    ///
    /// Runs before every turn: a history handed back through
    /// [`set_history`](Self::set_history) may have lost its header.
    pub fn ensure_system_prompt(&mut self, model: &str) -> &History {
        if self.history.ensure_system_prompt(self.prompts.select(model)) {
            tracing::debug!(model = %model, "system prompt injected");
        }
        &self.history
    }

    pub fn append_user(&mut self, content: impl Into<MessageContent>) -> &History {
        self.history.push_user(content);
        &self.history
    }

    pub fn append_assistant(&mut self, content: impl Into<String>) -> &History {
        self.history.push_assistant(content);
        &self.history
    }

    /// Start a new conversation
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Replace the history wholesale
    pub fn set_history(&mut self, history: History) {
        self.history = history;
    }

    pub fn prompts(&self) -> &SystemPrompts {
        &self.prompts
    }
}
