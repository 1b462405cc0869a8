//! Line-oriented terminal UI.
//!
//! One loop multiplexes stdin and the log channel. Plain lines are chat
//! text; `/`-prefixed lines are commands. The loop returns on `/close`
//! after sealing the chat history to disk.

use std::sync::Arc;

use sczero_core::constants::HISTORY_FILE;
use sczero_core::types::{short_peer_id, LOCAL_SENDER};
use sczero_crypto::NodeKeypair;
use sczero_p2p::HostCommand;
use sczero_store::{ChatLog, PersistentStore};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

/// Display width for abbreviated sender names in `/history` output.
const SHORT_ID: usize = 12;

pub struct UiContext {
    pub store: PersistentStore,
    pub keypair: NodeKeypair,
    pub chat_log: Arc<ChatLog>,
    pub outbound_tx: mpsc::Sender<String>,
    pub log_rx: mpsc::Receiver<String>,
    pub cmd_tx: mpsc::Sender<HostCommand>,
}

pub async fn run(mut ctx: UiContext) {
    let mut input = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            maybe_log = ctx.log_rx.recv() => match maybe_log {
                Some(line) => println!("{line}"),
                None => break,
            },
            maybe_input = input.next_line() => {
                let line = match maybe_input {
                    Ok(Some(line)) => line,
                    // EOF or a broken terminal ends the UI.
                    _ => break,
                };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if text.starts_with('/') {
                    if handle_command(&mut ctx, text).await {
                        break;
                    }
                } else {
                    send_message(&ctx, text).await;
                }
            }
        }
    }
}

/// Hand typed text to whichever session pulls it next. The log records the
/// attempt regardless of delivery.
async fn send_message(ctx: &UiContext, text: &str) {
    match ctx.outbound_tx.try_send(text.to_string()) {
        Ok(()) => {
            ctx.chat_log.append(LOCAL_SENDER, text).await;
            println!("{LOCAL_SENDER}: {text}");
        }
        Err(_) => println!("[System] Channel full or no connection."),
    }
}

/// Returns `true` when the UI should exit (`/close`).
async fn handle_command(ctx: &mut UiContext, command: &str) -> bool {
    let mut parts = command.splitn(2, ' ');
    match (parts.next().unwrap_or(""), parts.next()) {
        ("/connect", Some(addr)) if !addr.trim().is_empty() => {
            let addr = addr.trim().to_string();
            let _ = ctx.cmd_tx.send(HostCommand::Dial { addr }).await;
            false
        }
        ("/connect", _) => {
            println!("[System] Usage: /connect <multiaddr ending in /p2p/<peer-id>>");
            false
        }
        ("/history", _) => {
            print_history(ctx).await;
            false
        }
        ("/help", _) => {
            println!("[System] Commands:");
            println!("  /connect <addr>  dial a peer multiaddr");
            println!("  /history         show the chat log");
            println!("  /close           save history and exit");
            false
        }
        ("/close", _) => {
            let snapshot = ctx.chat_log.snapshot().await;
            match ctx.store.save_history(&ctx.keypair, &snapshot) {
                Ok(()) => println!("\n[System] Chat history saved to '{HISTORY_FILE}'."),
                Err(e) => eprintln!("\n[Error] Save failed: {e}"),
            }
            true
        }
        _ => {
            println!("[System] Unknown command. Use /help.");
            false
        }
    }
}

async fn print_history(ctx: &UiContext) {
    println!("--- Past History ---");
    for message in ctx.chat_log.snapshot().await {
        println!(
            "[{}] {}: {}",
            message.timestamp.format("%H:%M"),
            short_peer_id(&message.sender, SHORT_ID),
            message.content
        );
    }
    println!("--------------------");
}
