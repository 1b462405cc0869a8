//! sczero-node — the SC-Zero messenger binary.
//!
//! Startup sequence:
//!   1. Load (or generate) the signing key from the data directory
//!   2. Load the sealed self identity block, mining a fresh one if absent
//!   3. Seed the ledger with the self block
//!   4. Load the sealed chat history (a wrong key degrades to an empty log)
//!   5. Start the libp2p host, then the terminal UI loop

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use sczero_core::constants::{CHANNEL_CAPACITY, DIFFICULTY};
use sczero_core::SczeroError;
use sczero_crypto::NodeKeypair;
use sczero_identity::{IdentityBlock, Ledger};
use sczero_p2p::{HostCommand, P2pConfig, P2pHost, SessionContext};
use sczero_store::{ChatLog, PersistentStore};

mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "sczero-node",
    version,
    about = "SC-Zero — peer-to-peer messenger with proof-of-work identities"
)]
struct Args {
    /// Directory holding identity.key, my_identity.enc and chat_history.enc.
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// P2P listen address.
    #[arg(long, default_value = "/ip4/0.0.0.0/tcp/0")]
    listen: String,

    /// Multiaddr to dial on startup (skips the mode prompt).
    #[arg(long)]
    dial: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the chat UI.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".parse().expect("static filter parses")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    // ── Channels (UI <-> network) ─────────────────────────────────────────────
    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (log_tx, log_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

    // ── Persistent state ──────────────────────────────────────────────────────
    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("creating data dir {}", args.data_dir.display()))?;
    let store = PersistentStore::open(&args.data_dir);
    let keypair = store.load_or_generate_key().context("loading signing key")?;
    let self_block = load_or_mine_self_block(&store, &keypair)?;

    // ── Ledger, seeded with our own identity ──────────────────────────────────
    let ledger = Arc::new(Ledger::new());
    ledger
        .verify_and_add(self_block.clone())
        .await
        .map_err(|e| anyhow::anyhow!("own identity block failed verification: {e}"))?;

    // ── Chat history ──────────────────────────────────────────────────────────
    let chat_log = Arc::new(ChatLog::new());
    match store.load_history(&keypair) {
        Ok(messages) => {
            let count = messages.len();
            chat_log.replace(messages).await;
            let _ = log_tx
                .send(format!("[System] Auto-loaded {count} messages."))
                .await;
        }
        Err(SczeroError::NotFound(_)) => {}
        Err(e) => {
            let _ = log_tx
                .send(format!(
                    "[Error] History load failed ({e}); starting with an empty log."
                ))
                .await;
        }
    }

    // ── P2P host ──────────────────────────────────────────────────────────────
    let ctx = SessionContext {
        self_block: Arc::new(self_block.clone()),
        ledger: Arc::clone(&ledger),
        chat_log: Arc::clone(&chat_log),
        outbound_text: Arc::new(Mutex::new(outbound_rx)),
        log_tx: log_tx.clone(),
    };
    let p2p_config = P2pConfig {
        listen_addr: args.listen.clone(),
    };
    let (host, handle) = P2pHost::new(&keypair, &p2p_config, ctx)
        .map_err(|e| anyhow::anyhow!("building P2P host: {e}"))?;
    info!(peer_id = %handle.local_peer_id, "P2P identity");
    tokio::spawn(host.run());

    print_banner(&handle.local_peer_id.to_string(), &self_block.hash);

    // ── Mode selection ────────────────────────────────────────────────────────
    let dial_target = match args.dial {
        Some(addr) => Some(addr),
        None => select_mode()?,
    };
    if let Some(addr) = dial_target {
        let cmd_tx = handle.cmd_tx.clone();
        tokio::spawn(async move {
            // Give the listener a beat to come up before dialing out.
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = cmd_tx.send(HostCommand::Dial { addr }).await;
        });
    }

    let _ = log_tx
        .send("[System] SC-Zero started. Type /help for commands.".into())
        .await;

    // ── UI loop (returns on /close) ───────────────────────────────────────────
    ui::run(ui::UiContext {
        store,
        keypair,
        chat_log,
        outbound_tx,
        log_rx,
        cmd_tx: handle.cmd_tx.clone(),
    })
    .await;

    Ok(())
}

/// Load the persisted identity block, or mine one on first launch. A stored
/// block that no longer matches the current key (including one sealed under
/// a replaced key) is re-mined rather than trusted.
fn load_or_mine_self_block(
    store: &PersistentStore,
    keypair: &NodeKeypair,
) -> anyhow::Result<IdentityBlock> {
    let peer_id = keypair.peer_id().to_string();
    match store.load_self_block(keypair) {
        Ok(block) if block.peer_id == peer_id && block.verify().is_ok() => {
            info!(hash = %block.hash, "loaded existing identity block");
            return Ok(block);
        }
        Ok(_) => warn!("stored identity block does not match the current key; re-mining"),
        Err(SczeroError::NotFound(_)) => {}
        Err(SczeroError::DecryptFailure) => {
            warn!("identity block does not open under the current key; re-mining");
        }
        Err(e) => return Err(e).context("loading identity block"),
    }

    println!("[System] Mining identity block (difficulty {DIFFICULTY})...");
    let block = IdentityBlock::create(keypair, peer_id).context("mining identity block")?;
    store
        .save_self_block(keypair, &block)
        .context("saving identity block")?;
    println!("[System] Identity mined: {}", block.hash);
    Ok(block)
}

fn print_banner(peer_id: &str, block_hash: &str) {
    println!("====================================================");
    println!("        SC-Zero : Proof-of-Work Messenger");
    println!("====================================================");
    println!("Node ID    : {peer_id}");
    println!("Block Hash : {block_hash}");
    println!("Listen addresses are printed once the transport is up.");
    println!("----------------------------------------------------");
}

/// Interactive listen-vs-dial prompt, mirrored by `--dial` for scripted runs.
/// Returns the dial target, or `None` to wait for inbound connections.
fn select_mode() -> anyhow::Result<Option<String>> {
    let stdin = io::stdin();
    loop {
        println!();
        println!("[Mode Selection]");
        println!("1. Wait (Listen)");
        println!("2. Connect (Dial)");
        print!("Select> ");
        io::stdout().flush()?;

        let mut choice = String::new();
        if stdin.read_line(&mut choice)? == 0 {
            return Ok(None);
        }
        match choice.trim() {
            "1" => return Ok(None),
            "2" => {
                print!("Target Address> ");
                io::stdout().flush()?;
                let mut addr = String::new();
                if stdin.read_line(&mut addr)? == 0 {
                    return Ok(None);
                }
                let addr = addr.trim();
                if !addr.is_empty() {
                    return Ok(Some(addr.to_string()));
                }
            }
            _ => {}
        }
    }
}
