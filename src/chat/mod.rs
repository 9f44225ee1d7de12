// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming conversation engine
//!
//! A turn flows through these pieces, leaves first:
//! - [`sse`]: raw response bytes to [`StreamChunk`]s
//! - [`reasoning`]: chunks tagged as reasoning or visible answer
//! - [`history`] and [`prompts`]: the message list and its system prompt
//! - [`session`]: runs turns and commits answers to history

pub mod history;
pub mod prompts;
pub mod reasoning;
pub mod session;
pub mod sse;
pub mod streaming;

pub use history::{History, HistoryManager};
pub use prompts::SystemPrompts;
pub use reasoning::{ReasoningSplitter, ReasoningState};
pub use session::{ConversationSession, Turn};
pub use sse::{decode_stream, StreamDecoder};
pub use streaming::{StreamChunk, TurnAccumulator, TurnOutput};
