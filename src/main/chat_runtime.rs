// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use polain::cli::ChatArgs;
use polain::config::Settings;
use polain::error::{ErrorKind, Result};

use super::cli_commands::{drive_turn, new_session, resolve_model, start_turn, ChunkPrinter};

/// One line typed at the chat prompt
#[derive(Debug, PartialEq, Eq)]
pub(super) enum ChatInput {
    Empty,
    Prompt(String),
    NewConversation,
    SwitchModel(String),
    ShowModel,
    Help,
    Quit,
    Unknown(String),
}

pub(super) fn parse_input(line: &str) -> ChatInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ChatInput::Empty;
    }
    if !trimmed.starts_with('/') {
        return ChatInput::Prompt(trimmed.to_string());
    }

    let mut words = trimmed.splitn(2, char::is_whitespace);
    let command = words.next().unwrap_or_default();
    let arg = words.next().map(str::trim).unwrap_or_default();

    match command {
        "/new" | "/clear" => ChatInput::NewConversation,
        "/model" if arg.is_empty() => ChatInput::ShowModel,
        "/model" => ChatInput::SwitchModel(arg.to_string()),
        "/help" => ChatInput::Help,
        "/quit" | "/exit" => ChatInput::Quit,
        other => ChatInput::Unknown(other.to_string()),
    }
}

fn print_welcome(model: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("polain v{}", env!("CARGO_PKG_VERSION"));
    stdout.execute(ResetColor)?;
    println!("Model: {}", model);
    println!("Type /help for commands, Ctrl+C stops an answer.");
    println!();
    Ok(())
}

fn print_help() {
    println!("  /new           start a new conversation");
    println!("  /model         show the current model");
    println!("  /model NAME    switch to another model");
    println!("  /quit          leave (Ctrl+D works too)");
}

fn print_notice(color: Color, message: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(color))?;
    println!("{}", message);
    stdout.execute(ResetColor)?;
    Ok(())
}

/// Run interactive chat mode
pub(super) async fn run_chat(args: ChatArgs, settings: Settings) -> Result<()> {
    let mut session = new_session(&settings);
    let mut model = resolve_model(args.model, &settings, session.registry()).await;
    let mut printer = ChunkPrinter::new(!args.hide_reasoning);

    print_welcome(&model)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_input(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Help => print_help(),
            ChatInput::ShowModel => println!("Model: {}", model),
            ChatInput::NewConversation => {
                session.reset();
                print_notice(Color::Green, "Started a new conversation.")?;
            }
            ChatInput::SwitchModel(name) => {
                let known = session.registry().models();
                if !known.is_empty() && !known.iter().any(|m| m.name == name) {
                    print_notice(
                        Color::Yellow,
                        &format!("'{}' is not in the model listing; trying it anyway.", name),
                    )?;
                }
                model = name;
                println!("Model: {}", model);
            }
            ChatInput::Unknown(command) => {
                print_notice(Color::Yellow, &format!("Unknown command: {}", command))?;
            }
            ChatInput::Prompt(text) => {
                let turn = match start_turn(&mut session, text, &model).await {
                    Ok(Some(turn)) => turn,
                    Ok(None) => continue,
                    Err(e) => {
                        print_notice(Color::Red, &format!("Error: {}", e))?;
                        continue;
                    }
                };
                match drive_turn(&mut session, turn, &mut printer).await {
                    Ok(_) => {}
                    Err(e) if e.kind() == ErrorKind::EmptyResponse => {
                        print_notice(
                            Color::Yellow,
                            "The model returned an empty response. Try again or switch models.",
                        )?;
                    }
                    Err(e) => print_notice(Color::Red, &format!("Error: {}", e))?,
                }
            }
        }
    }

    Ok(())
}
