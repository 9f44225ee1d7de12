// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use crossterm::{
    style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor},
    ExecutableCommand,
};
use futures::StreamExt;

use polain::chat::{ConversationSession, StreamChunk, Turn, TurnOutput};
use polain::cli::attachments::build_prompt;
use polain::cli::{AskArgs, ConfigArgs, ConfigCommands};
use polain::config::Settings;
use polain::error::Result;
use polain::llm::message::MessageContent;
use polain::llm::provider::ChatTransport;
use polain::llm::providers::PollinationsTransport;
use polain::models::ModelRegistry;

/// Build a session talking to the configured endpoints
pub(super) fn new_session(settings: &Settings) -> ConversationSession {
    let transport: Arc<dyn ChatTransport> = Arc::new(PollinationsTransport::from_settings(settings));
    let registry = Arc::new(ModelRegistry::from_settings(settings));
    ConversationSession::from_settings(settings, transport, registry)
}

/// Pick the model for this run.
///
/// An explicit choice wins. Otherwise the configured model is used, unless
/// the listing loaded and does not offer it; then the first model that is
/// not flagged uncensored is used instead.
pub(super) async fn resolve_model(
    requested: Option<String>,
    settings: &Settings,
    registry: &ModelRegistry,
) -> String {
    if let Some(model) = requested {
        return model;
    }

    let configured = settings.effective_model();
    let offered = match registry.load().await {
        Ok(models) => models.iter().any(|m| m.name == configured),
        // Listing unavailable: trust the configuration.
        Err(_) => return configured,
    };
    if offered {
        return configured;
    }

    match registry.default_model() {
        Some(fallback) => {
            tracing::warn!(
                configured = %configured,
                fallback = %fallback.name,
                "Configured model is not offered, using the service default"
            );
            fallback.name.clone()
        }
        None => configured,
    }
}

/// Writes tagged chunks to stdout, reasoning dimmed
pub(super) struct ChunkPrinter {
    show_reasoning: bool,
    in_reasoning: bool,
}

impl ChunkPrinter {
    pub(super) fn new(show_reasoning: bool) -> Self {
        Self {
            show_reasoning,
            in_reasoning: false,
        }
    }

    pub(super) fn print(&mut self, chunk: &StreamChunk) -> Result<()> {
        let mut stdout = io::stdout();
        if chunk.thinking {
            if !self.show_reasoning {
                return Ok(());
            }
            if !self.in_reasoning {
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                stdout.execute(SetAttribute(Attribute::Dim))?;
                self.in_reasoning = true;
            }
        } else if self.in_reasoning {
            self.leave_reasoning()?;
            println!();
        }

        print!("{}", chunk.content);
        stdout.flush()?;
        Ok(())
    }

    /// Restore the terminal and end the line
    pub(super) fn end(&mut self) -> Result<()> {
        if self.in_reasoning {
            self.leave_reasoning()?;
        }
        println!();
        Ok(())
    }

    fn leave_reasoning(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        stdout.execute(SetAttribute(Attribute::Reset))?;
        stdout.execute(ResetColor)?;
        self.in_reasoning = false;
        Ok(())
    }
}

/// Start a turn; Ctrl+C before the stream opens gives `Ok(None)`
pub(super) async fn start_turn(
    session: &mut ConversationSession,
    prompt: impl Into<MessageContent>,
    model: &str,
) -> Result<Option<Turn>> {
    tokio::select! {
        turn = session.ask(prompt, model) => turn.map(Some),
        _ = tokio::signal::ctrl_c() => {
            print_interrupted()?;
            Ok(None)
        }
    }
}

fn print_interrupted() -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Yellow))?;
    println!("[interrupted]");
    stdout.execute(ResetColor)?;
    Ok(())
}

/// Print a turn as it streams and commit it.
///
/// Ctrl+C abandons the turn: nothing is appended and `Ok(None)` comes back.
pub(super) async fn drive_turn(
    session: &mut ConversationSession,
    mut turn: Turn,
    printer: &mut ChunkPrinter,
) -> Result<Option<TurnOutput>> {
    let mut interrupted = false;
    loop {
        tokio::select! {
            chunk = turn.next() => match chunk {
                Some(chunk) => printer.print(&chunk)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
                break;
            }
        }
    }
    printer.end()?;

    if interrupted {
        turn.abandon();
        print_interrupted()?;
        return Ok(None);
    }

    session.finish(turn).await.map(Some)
}

/// Run ask command (single question)
pub(super) async fn run_ask(args: AskArgs, settings: Settings) -> Result<()> {
    let mut session = new_session(&settings);
    let model = resolve_model(args.model, &settings, session.registry()).await;
    let definition = session.registry().lookup(&model);

    let prompt = build_prompt(&args.prompt, args.images.as_slice(), &definition)?;
    let Some(turn) = start_turn(&mut session, prompt, &model).await? else {
        return Ok(());
    };

    let mut printer = ChunkPrinter::new(!args.hide_reasoning);
    drive_turn(&mut session, turn, &mut printer).await?;
    Ok(())
}

/// List the models offered by the service
pub(super) async fn run_models(settings: Settings) -> Result<()> {
    let registry = ModelRegistry::from_settings(&settings);
    let models = registry.load().await?;
    let default = registry.default_model().map(|m| m.name.clone());

    let width = models.iter().map(|m| m.name.len()).max().unwrap_or(0);
    let mut stdout = io::stdout();
    for model in models {
        let mut flags = Vec::new();
        if model.vision {
            flags.push("vision");
        }
        if model.reasoning {
            flags.push("reasoning");
        }
        if model.uncensored {
            flags.push("uncensored");
        }

        if default.as_deref() == Some(model.name.as_str()) {
            stdout.execute(SetForegroundColor(Color::Green))?;
            print!("* ");
        } else {
            print!("  ");
        }
        print!("{:width$}", model.name, width = width);
        stdout.execute(ResetColor)?;

        print!("  {}", model.description);
        if !flags.is_empty() {
            stdout.execute(SetForegroundColor(Color::Cyan))?;
            print!(" [{}]", flags.join(", "));
            stdout.execute(ResetColor)?;
        }
        println!();
    }
    Ok(())
}

/// Run config subcommands
pub(super) fn run_config_command(args: ConfigArgs, settings: Settings, path: &Path) -> Result<()> {
    match args.command {
        ConfigCommands::Init { force } => {
            if force {
                settings.overwrite(path)?;
            } else {
                settings.save_to(path)?;
            }
            println!("Settings written to {}", path.display());
        }
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&settings)?;
            println!("{}", json);
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
    }
    Ok(())
}
