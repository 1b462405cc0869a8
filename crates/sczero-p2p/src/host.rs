use std::collections::HashSet;
use std::time::Duration;

use futures::StreamExt;
use libp2p::multiaddr::Protocol;
use libp2p::swarm::SwarmEvent;
use libp2p::{identify, noise, ping, tcp, yamux, Multiaddr, PeerId, StreamProtocol, Swarm};
use libp2p_stream as stream;
use libp2p_swarm::NetworkBehaviour;
use sczero_core::constants::{CHANNEL_CAPACITY, DIAL_TIMEOUT_SECS, PROTOCOL_ID};
use sczero_core::SczeroError;
use sczero_crypto::NodeKeypair;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::P2pConfig;
use crate::session::{PeerSession, SessionContext};

/// Combined libp2p network behaviour for an SC-Zero node.
///
/// The `#[derive(NetworkBehaviour)]` macro auto-generates a
/// `NodeBehaviourEvent` enum with one variant per field.
#[derive(NetworkBehaviour)]
pub struct NodeBehaviour {
    pub stream: stream::Behaviour,
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
}

/// Instructions the UI can issue to the running host.
#[derive(Debug)]
pub enum HostCommand {
    /// Dial a full multiaddr ending in `/p2p/<peer-id>`.
    Dial { addr: String },
}

/// Application-facing handle returned from `P2pHost::new()`.
pub struct P2pHandle {
    pub cmd_tx: mpsc::Sender<HostCommand>,
    /// Local libp2p peer identity.
    pub local_peer_id: PeerId,
}

/// Owns the libp2p Swarm. Pass to `tokio::spawn(host.run())`.
///
/// Inbound and outbound `/sc-zero/2.0.0` streams both end up as a spawned
/// [`PeerSession`]; the host itself never touches session traffic.
pub struct P2pHost {
    swarm: Swarm<NodeBehaviour>,
    incoming: stream::IncomingStreams,
    control: stream::Control,
    protocol: StreamProtocol,
    cmd_rx: mpsc::Receiver<HostCommand>,
    pending_dials: HashSet<PeerId>,
    ctx: SessionContext,
}

impl P2pHost {
    /// Build the host from the node's persistent key, so the transport peer
    /// id matches the identity block's `peer_id`.
    pub fn new(
        keypair: &NodeKeypair,
        config: &P2pConfig,
        ctx: SessionContext,
    ) -> Result<(Self, P2pHandle), Box<dyn std::error::Error + Send + Sync>> {
        let mut swarm = libp2p::SwarmBuilder::with_existing_identity(keypair.libp2p_keypair().clone())
            .with_tokio()
            .with_tcp(
                tcp::Config::default(),
                noise::Config::new,
                yamux::Config::default,
            )?
            .with_behaviour(|key: &libp2p::identity::Keypair| NodeBehaviour {
                stream: stream::Behaviour::new(),
                identify: identify::Behaviour::new(identify::Config::new(
                    PROTOCOL_ID.to_string(),
                    key.public(),
                )),
                ping: ping::Behaviour::default(),
            })?
            .build();

        let protocol = StreamProtocol::new(PROTOCOL_ID);
        let mut control = swarm.behaviour().stream.new_control();
        let incoming = control.accept(protocol.clone())?;

        let listen: Multiaddr = config.listen_addr.parse()?;
        swarm.listen_on(listen)?;

        let local_peer_id = *swarm.local_peer_id();
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let host = P2pHost {
            swarm,
            incoming,
            control,
            protocol,
            cmd_rx,
            pending_dials: HashSet::new(),
            ctx,
        };
        let handle = P2pHandle {
            cmd_tx,
            local_peer_id,
        };
        Ok((host, handle))
    }

    /// Drive the host event loop. Run in a dedicated tokio task; returns
    /// when the command channel closes, which tears down every connection.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },

                Some((peer, inbound)) = self.incoming.next() => {
                    info!(peer = %peer, "inbound stream accepted");
                    self.log("[System] Secure connection established!").await;
                    let session = PeerSession::new(inbound, peer.to_string(), self.ctx.clone());
                    tokio::spawn(session.run());
                }

                event = self.swarm.select_next_some() => self.handle_swarm_event(event).await,
            }
        }
    }

    async fn handle_command(&mut self, cmd: HostCommand) {
        match cmd {
            HostCommand::Dial { addr } => self.dial(&addr).await,
        }
    }

    /// Start a dial. The stream itself is opened once the connection is
    /// up (see `ConnectionEstablished` handling).
    async fn dial(&mut self, addr: &str) {
        self.log(format!("[System] Dialing {addr}...")).await;

        let target: Multiaddr = match addr.parse() {
            Ok(ma) => ma,
            Err(e) => {
                let err = SczeroError::InvalidAddress(e.to_string());
                self.log(format!("[Error] {err}")).await;
                return;
            }
        };
        let Some(Protocol::P2p(peer_id)) = target.iter().last() else {
            let err = SczeroError::InvalidAddress("must end in /p2p/<peer-id>".into());
            self.log(format!("[Error] {err}")).await;
            return;
        };

        if let Err(e) = self.swarm.dial(target) {
            let err = SczeroError::ConnectFailed(e.to_string());
            self.log(format!("[Error] {err}")).await;
            return;
        }
        self.pending_dials.insert(peer_id);
    }

    async fn handle_swarm_event(&mut self, event: SwarmEvent<NodeBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                let full = format!("{address}/p2p/{}", self.swarm.local_peer_id());
                info!(addr = %full, "listening");
                self.log(format!("[System] Listening on {full}")).await;
            }

            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                debug!(peer = %peer_id, "connection established");
                if self.pending_dials.remove(&peer_id) {
                    self.open_outbound(peer_id);
                }
            }

            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                if let Some(peer_id) = peer_id {
                    self.pending_dials.remove(&peer_id);
                }
                warn!(error = %error, "outgoing connection failed");
                let err = SczeroError::ConnectFailed(error.to_string());
                self.log(format!("[Error] {err}")).await;
            }

            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                debug!(peer = %peer_id, "connection closed");
            }

            _ => {}
        }
    }

    /// Open the application stream on an established connection and hand it
    /// to a session. Bounded by the dial timeout.
    fn open_outbound(&self, peer_id: PeerId) {
        let mut control = self.control.clone();
        let protocol = self.protocol.clone();
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            let opened = tokio::time::timeout(
                Duration::from_secs(DIAL_TIMEOUT_SECS),
                control.open_stream(peer_id, protocol),
            )
            .await;
            match opened {
                Ok(Ok(outbound)) => {
                    let _ = ctx
                        .log_tx
                        .send("[System] Ready to chat!".into())
                        .await;
                    PeerSession::new(outbound, peer_id.to_string(), ctx).run().await;
                }
                Ok(Err(e)) => {
                    let err = SczeroError::StreamFailed(e.to_string());
                    let _ = ctx.log_tx.send(format!("[Error] {err}")).await;
                }
                Err(_) => {
                    let err = SczeroError::StreamFailed("timed out".into());
                    let _ = ctx.log_tx.send(format!("[Error] {err}")).await;
                }
            }
        });
    }

    async fn log(&mut self, line: impl Into<String>) {
        let _ = self.ctx.log_tx.send(line.into()).await;
    }
}
