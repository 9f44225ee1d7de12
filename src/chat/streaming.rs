// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming response handling
//!
//! The chunk type delivered to callers, and the accumulator that rebuilds
//! the two logical streams (visible answer and reasoning) from it.

use serde::Serialize;

/// One content delta of a streamed response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamChunk {
    /// Server-assigned response id, stable for the whole response
    pub id: String,

    /// Content delta, possibly empty
    pub content: String,

    /// Set exactly once, on the last chunk of a response that ended normally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Whether this delta belongs to the reasoning block
    pub thinking: bool,
}

impl StreamChunk {
    /// Create a visible content chunk
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            finish_reason: None,
            thinking: false,
        }
    }

    /// Builder: tag as reasoning
    pub fn thinking(mut self, thinking: bool) -> Self {
        self.thinking = thinking;
        self
    }

    /// Builder: mark as the last chunk
    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }

    /// Whether this chunk ends the response
    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Accumulator for the chunks of one turn
#[derive(Debug, Default, Clone)]
pub struct TurnAccumulator {
    /// Response id, from the first chunk
    id: Option<String>,
    /// Visible answer so far
    content: String,
    /// Reasoning so far
    reasoning: String,
    /// Finish reason, if the response ended normally
    finish_reason: Option<String>,
    /// Number of chunks seen
    chunk_count: usize,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk to the stream it belongs to
    pub fn push(&mut self, chunk: &StreamChunk) {
        if self.id.is_none() && !chunk.id.is_empty() {
            self.id = Some(chunk.id.clone());
        }
        if chunk.thinking {
            self.reasoning.push_str(&chunk.content);
        } else {
            self.content.push_str(&chunk.content);
        }
        if let Some(ref reason) = chunk.finish_reason {
            self.finish_reason = Some(reason.clone());
        }
        self.chunk_count += 1;
    }

    /// Response id, if any chunk carried one
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Visible answer accumulated so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Reasoning accumulated so far
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Finish reason, if the response ended normally
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    /// Number of chunks seen
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Whether the visible answer has any non-whitespace content
    pub fn has_visible_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Consume the accumulator
    pub fn finish(self) -> TurnOutput {
        TurnOutput {
            id: self.id,
            content: self.content,
            reasoning: self.reasoning,
            finish_reason: self.finish_reason,
        }
    }
}

/// Assembled result of one turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnOutput {
    pub id: Option<String>,
    /// Visible answer; this is what goes into history
    pub content: String,
    /// Reasoning block; never replayed as context
    pub reasoning: String,
    pub finish_reason: Option<String>,
}
