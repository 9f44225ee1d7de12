// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Polain - streaming chat client for your terminal
//!
//! Entry point for the Polain CLI application.

use clap::Parser;

use polain::cli::{ChatArgs, Cli, Commands};
use polain::config::Settings;
use polain::error::Result;

#[path = "main/chat_runtime.rs"]
mod chat_runtime;
#[path = "main/cli_commands.rs"]
mod cli_commands;

use chat_runtime::run_chat;
use cli_commands::{run_ask, run_config_command, run_models};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing; stdout carries the answer, so logs go to stderr.
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if cli.verbose > 0 {
        let directive = if cli.verbose > 1 {
            "polain=trace"
        } else {
            "polain=debug"
        };
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Load settings
    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load_from(&settings_path)?;

    match cli.command {
        None => {
            run_chat(ChatArgs::default(), settings).await?;
        }
        Some(Commands::Chat(args)) => {
            run_chat(args, settings).await?;
        }
        Some(Commands::Ask(args)) => {
            run_ask(args, settings).await?;
        }
        Some(Commands::Models) => {
            run_models(settings).await?;
        }
        Some(Commands::Config(args)) => {
            run_config_command(args, settings, &settings_path)?;
        }
    }

    Ok(())
}
