//! `entangle send` and `entangle show`.

use anyhow::Result;
use console::style;

use entangle_types::chat::{ChatId, Transcript};
use entangle_types::error::TurnError;
use entangle_types::turn::TurnInput;

use crate::state::{AppState, Storage};

/// Run one turn against the configured store and provider.
pub async fn send_turn(state: &AppState, input: TurnInput, json: bool) -> Result<()> {
    match state.orchestrator.submit_turn(input).await {
        Ok(transcript) => print_transcript(&transcript, json),
        Err(e @ TurnError::Upstream { .. }) => {
            if let Some(chat_id) = e.chat_id() {
                eprintln!(
                    "  {} Your message was saved. Run {} to see the chat.",
                    style("!").yellow().bold(),
                    style(format!("entangle show {chat_id}")).cyan()
                );
            }
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Print the transcript of an existing chat.
pub async fn show_transcript(storage: &Storage, chat_id: &str, json: bool) -> Result<()> {
    let chat_id = ChatId::parse(chat_id).map_err(TurnError::from)?;
    let transcript = storage.projection().project(&chat_id).await?;
    print_transcript(&transcript, json)
}

fn print_transcript(transcript: &Transcript, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(transcript)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style("Chat").bold(),
        style(&transcript.chat_id).cyan().bold()
    );
    println!();

    if transcript.messages.is_empty() {
        println!("  {}", style("No messages yet.").dim());
    }

    for entry in &transcript.messages {
        let sender = if entry.sender_id.is_ai() {
            style(entry.sender_id.to_string()).magenta().bold()
        } else {
            style(entry.sender_id.to_string()).green().bold()
        };
        println!(
            "  {} {}",
            sender,
            style(entry.created_at.format("%Y-%m-%d %H:%M:%S UTC")).dim()
        );
        for line in entry.content.lines() {
            println!("    {line}");
        }
        println!();
    }

    Ok(())
}
