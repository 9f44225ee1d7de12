// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for Polain.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Polain - streaming chat client for the Pollinations text API
#[derive(Parser, Debug)]
#[command(name = "polain")]
#[command(version, about = "Streaming chat client for the Pollinations text API")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive conversation (default when no command given)
    Chat(ChatArgs),

    /// Ask a single question (non-interactive)
    Ask(AskArgs),

    /// List the available models
    Models,

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Do not print reasoning blocks
    #[arg(long)]
    pub hide_reasoning: bool,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub prompt: String,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Attach an image (requires a model with vision)
    #[arg(short, long = "image")]
    pub images: Vec<PathBuf>,

    /// Do not print the reasoning block
    #[arg(long)]
    pub hide_reasoning: bool,
}

/// Arguments for configuration management
#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write the current settings (defaults if none) to the settings file
    Init {
        /// Overwrite an existing file instead of merging into it
        #[arg(long)]
        force: bool,
    },

    /// Print the effective settings
    Show,

    /// Print the settings file location
    Path,
}
