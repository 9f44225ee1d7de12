// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Polain - streaming chat client for the Pollinations text API.
//!
//! This crate exposes the conversation engine used by the `polain` CLI
//! (`src/main.rs`). It can also be embedded by any other front end.
//!
//! Architecture highlights:
//! - `chat`: history, SSE decoding, reasoning split and the turn lifecycle
//! - `llm`: wire message types and the `ChatTransport` abstraction
//! - `models`: the remote model listing and capability lookups
//! - `config`: user settings
//! - `cli`: argument definitions and attachment encoding

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;

pub use error::{PolainError, Result};
