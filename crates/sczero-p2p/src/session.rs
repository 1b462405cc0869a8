use std::sync::Arc;

use futures::io::BufReader;
use futures::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, StreamExt};
use sczero_core::constants::CHANNEL_CAPACITY;
use sczero_core::types::short_peer_id;
use sczero_identity::{IdentityBlock, Ledger};
use sczero_store::ChatLog;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::packet::NetworkPacket;

/// Display width for abbreviated peer ids in log lines.
const SHORT_ID: usize = 12;

/// Shared state handed to every session.
#[derive(Clone)]
pub struct SessionContext {
    /// This node's own mined identity block, sent as AUTH on every stream.
    pub self_block: Arc<IdentityBlock>,
    /// Registry of verified identities, shared across sessions.
    pub ledger: Arc<Ledger>,
    /// Chat history, shared across sessions and the UI.
    pub chat_log: Arc<ChatLog>,
    /// Outbound user text. Live sessions' writers compete for it, so each
    /// typed line goes out on exactly one stream.
    pub outbound_text: Arc<Mutex<mpsc::Receiver<String>>>,
    /// Log lines destined for the UI.
    pub log_tx: mpsc::Sender<String>,
}

impl SessionContext {
    async fn log(&self, line: impl Into<String>) {
        let _ = self.log_tx.send(line.into()).await;
    }
}

/// One connected stream: a reader task dispatching inbound packets and a
/// writer task that solely owns the write half.
///
/// When the reader needs to emit (REQUEST/RESPONSE), it hands the packet to
/// the writer through a bounded control queue rather than touching the
/// stream itself.
pub struct PeerSession<S> {
    stream: S,
    /// Transport-reported remote id; display fallback until AUTH names the
    /// speaker authoritatively.
    remote_fallback: String,
    ctx: SessionContext,
}

impl<S> PeerSession<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(stream: S, remote_fallback: impl Into<String>, ctx: SessionContext) -> Self {
        Self {
            stream,
            remote_fallback: remote_fallback.into(),
            ctx,
        }
    }

    /// Drive the session until the stream dies. Returns once both halves
    /// have exited; no reconnect is attempted here.
    pub async fn run(self) {
        let (read_half, write_half) = self.stream.split();
        let (control_tx, control_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let writer = tokio::spawn(write_loop(write_half, control_rx, self.ctx.clone()));
        read_loop(read_half, control_tx, self.remote_fallback, self.ctx).await;
        // Dropping the reader's control_tx above lets the writer observe a
        // closed queue and exit.
        let _ = writer.await;
    }
}

async fn send_packet<W>(stream: &mut W, packet: &NetworkPacket) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(packet.to_line().as_bytes()).await?;
    stream.flush().await
}

/// Sole owner of the write half. Emits the AUTH/GOSSIP handshake first,
/// then multiplexes reader-originated control packets with user text.
async fn write_loop<W>(
    mut stream: W,
    mut control_rx: mpsc::Receiver<NetworkPacket>,
    ctx: SessionContext,
) where
    W: AsyncWrite + Unpin,
{
    let auth = match ctx.self_block.to_wire() {
        Ok(wire) => NetworkPacket::Auth(wire),
        Err(e) => {
            warn!(error = %e, "self block failed to encode; closing session");
            return;
        }
    };
    let gossip = NetworkPacket::Gossip(
        serde_json::to_string(&ctx.ledger.all_peer_ids().await).unwrap_or_else(|_| "[]".into()),
    );
    for packet in [auth, gossip] {
        if send_packet(&mut stream, &packet).await.is_err() {
            ctx.log("[System] Send failed.").await;
            return;
        }
    }

    loop {
        tokio::select! {
            maybe_packet = control_rx.recv() => match maybe_packet {
                Some(packet) => {
                    if send_packet(&mut stream, &packet).await.is_err() {
                        ctx.log("[System] Send failed.").await;
                        break;
                    }
                }
                // Reader exited; the session is over.
                None => break,
            },
            maybe_text = recv_user_text(&ctx.outbound_text) => match maybe_text {
                Some(text) => {
                    if send_packet(&mut stream, &NetworkPacket::Msg(text)).await.is_err() {
                        ctx.log("[System] Send failed.").await;
                        break;
                    }
                }
                // UI hung up; the node is shutting down.
                None => break,
            },
        }
    }
}

async fn recv_user_text(outbound: &Arc<Mutex<mpsc::Receiver<String>>>) -> Option<String> {
    outbound.lock().await.recv().await
}

/// Decode inbound frames and dispatch by packet type. There is no
/// pre-handshake state: any packet type is accepted at any time.
async fn read_loop<R>(
    read_half: R,
    control_tx: mpsc::Sender<NetworkPacket>,
    remote_fallback: String,
    ctx: SessionContext,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(read_half).lines();

    // The peer_id from the peer's AUTH block is the authoritative speaker
    // identity; until one arrives the transport id is the display fallback.
    let mut speaker: Option<String> = None;
    // One-way transition per session, flipped when the peer's AUTH verifies.
    let mut verified = false;

    while let Some(result) = lines.next().await {
        let line = match result {
            Ok(line) => line,
            Err(_) => break,
        };
        let Some(packet) = NetworkPacket::from_line(&line) else {
            debug!("dropping malformed frame");
            continue;
        };

        match packet {
            NetworkPacket::Auth(payload) => match IdentityBlock::from_wire(&payload) {
                Ok(block) => {
                    let peer_id = block.peer_id.clone();
                    speaker = Some(peer_id.clone());
                    match ctx.ledger.verify_and_add(block).await {
                        Ok(()) => {
                            verified = true;
                            ctx.log(format!(
                                "[Auth] Identity verified: {}",
                                short_peer_id(&peer_id, SHORT_ID)
                            ))
                            .await;
                        }
                        Err(e) => {
                            ctx.log(format!(
                                "[Auth] Identity rejected for {}: {e}",
                                short_peer_id(&peer_id, SHORT_ID)
                            ))
                            .await;
                        }
                    }
                }
                Err(e) => {
                    ctx.log(format!("[Auth] Malformed identity block: {e}")).await;
                }
            },

            NetworkPacket::Gossip(payload) => {
                let ids: Vec<String> = match serde_json::from_str(&payload) {
                    Ok(ids) => ids,
                    Err(_) => {
                        debug!("dropping malformed gossip payload");
                        continue;
                    }
                };
                for id in ids {
                    if id == ctx.self_block.peer_id || ctx.ledger.is_verified(&id).await {
                        continue;
                    }
                    debug!(peer = %id, "requesting unknown identity");
                    let _ = control_tx.send(NetworkPacket::Request(id)).await;
                }
            }

            NetworkPacket::Request(peer_id) => {
                // Unknown ids get no reply.
                if let Some(block) = ctx.ledger.get(&peer_id).await {
                    if let Ok(wire) = block.to_wire() {
                        let _ = control_tx.send(NetworkPacket::Response(wire)).await;
                    }
                }
            }

            NetworkPacket::Response(payload) => match IdentityBlock::from_wire(&payload) {
                Ok(block) => {
                    let peer_id = block.peer_id.clone();
                    match ctx.ledger.verify_and_add(block).await {
                        Ok(()) => debug!(peer = %peer_id, "pulled identity verified"),
                        Err(e) => {
                            ctx.log(format!(
                                "[Sync] Pulled identity rejected for {}: {e}",
                                short_peer_id(&peer_id, SHORT_ID)
                            ))
                            .await;
                        }
                    }
                }
                Err(e) => debug!(error = %e, "dropping malformed response block"),
            },

            NetworkPacket::Msg(content) => {
                let sender = speaker.clone().unwrap_or_else(|| remote_fallback.clone());
                ctx.chat_log.append(&sender, &content).await;
                let status = if verified { "[Verified]" } else { "[Unverified]" };
                ctx.log(format!(
                    "{status} {}: {content}",
                    short_peer_id(&sender, SHORT_ID)
                ))
                .await;
            }
        }
    }

    ctx.log("[System] Disconnected.").await;
}
