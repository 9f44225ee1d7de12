// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI module for Polain
//!
//! Command-line argument parsing and the prompt-building boundary.

pub mod args;
pub mod attachments;

pub use args::*;
