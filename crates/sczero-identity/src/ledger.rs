use std::collections::HashMap;

use sczero_core::SczeroError;
use tokio::sync::RwLock;

use crate::block::IdentityBlock;

/// The node's in-memory registry of verified identity blocks.
///
/// Keyed by peer id, first valid block wins: entries are never overwritten
/// or removed for the lifetime of the process. Read-mostly; one writer per
/// newly verified peer.
#[derive(Default)]
pub struct Ledger {
    peers: RwLock<HashMap<String, IdentityBlock>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify `block` and admit it.
    ///
    /// Idempotent: if the peer id is already present this succeeds without
    /// re-verification and without mutation. The presence check, the
    /// verification and the insert run under one write lock, so two racing
    /// admissions for the same id cannot both insert.
    pub async fn verify_and_add(&self, block: IdentityBlock) -> Result<(), SczeroError> {
        let mut peers = self.peers.write().await;
        if peers.contains_key(&block.peer_id) {
            return Ok(());
        }
        block.verify()?;
        peers.insert(block.peer_id.clone(), block);
        Ok(())
    }

    pub async fn is_verified(&self, peer_id: &str) -> bool {
        self.peers.read().await.contains_key(peer_id)
    }

    pub async fn get(&self, peer_id: &str) -> Option<IdentityBlock> {
        self.peers.read().await.get(peer_id).cloned()
    }

    /// Snapshot of all known peer ids; the lock is released before return,
    /// so callers may iterate freely.
    pub async fn all_peer_ids(&self) -> Vec<String> {
        self.peers.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}
