//! sczero-p2p
//!
//! The session protocol and its libp2p transport glue.
//!
//! Each established stream runs one [`PeerSession`]: a reader that
//! dispatches the five packet types and a writer that owns the write half,
//! opening with the AUTH/GOSSIP handshake and then draining user text.
//! [`P2pHost`] owns the swarm, accepts inbound `/sc-zero/2.0.0` streams and
//! dials outbound on command.

pub mod config;
pub mod host;
pub mod packet;
pub mod session;

pub use config::P2pConfig;
pub use host::{HostCommand, P2pHandle, P2pHost};
pub use packet::NetworkPacket;
pub use session::{PeerSession, SessionContext};
