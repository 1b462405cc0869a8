use sczero_core::constants::DIFFICULTY;
use sczero_core::types::Timestamp;
use sczero_core::SczeroError;
use sczero_crypto::{sha256_hex, verify_marshalled, NodeKeypair};
use serde::{Deserialize, Serialize};

/// A self-signed, PoW-stamped record binding a public key to a peer id.
///
/// Immutable once mined: every field participates in the hash, so any
/// mutation is caught by [`IdentityBlock::verify`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityBlock {
    pub timestamp: Timestamp,
    pub peer_id: String,
    /// Marshalled public key. Self-describing: carries its algorithm tag,
    /// so a verifier is reconstructed from these bytes alone.
    pub pub_key: Vec<u8>,
    /// Signature by the owner's private key over `peer_id || timestamp`.
    pub signature: Vec<u8>,
    /// Hex SHA-256 of the canonical record; starts with the PoW target.
    pub hash: String,
    /// Mining effort counter.
    pub nonce: u64,
}

impl IdentityBlock {
    /// Create and mine a block for `peer_id`, signed by `keypair`.
    ///
    /// Mining is CPU-bound and synchronous; at difficulty 3 it finishes in
    /// well under a second and runs only at first launch.
    pub fn create(keypair: &NodeKeypair, peer_id: String) -> Result<Self, SczeroError> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = keypair.sign(sign_preimage(&peer_id, timestamp).as_bytes())?;

        let mut block = Self {
            timestamp,
            peer_id,
            pub_key: keypair.public_bytes(),
            signature,
            hash: String::new(),
            nonce: 0,
        };
        block.mine();
        Ok(block)
    }

    /// The canonical record hashed for PoW. Fields are `'|'`-delimited;
    /// every field alphabet (decimal, base58, lowercase hex) excludes the
    /// delimiter, so no two distinct blocks share a record.
    fn canonical_record(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.timestamp,
            self.peer_id,
            hex::encode(&self.pub_key),
            hex::encode(&self.signature),
            self.nonce
        )
    }

    /// Recompute the hash from the current field values.
    pub fn compute_hash(&self) -> String {
        sha256_hex(self.canonical_record().as_bytes())
    }

    /// Iterate the nonce until the hash meets the difficulty target.
    fn mine(&mut self) {
        let target = difficulty_target();
        loop {
            self.hash = self.compute_hash();
            if self.hash.starts_with(&target) {
                break;
            }
            self.nonce += 1;
        }
    }

    /// The full verification predicate:
    /// 1. the stored hash meets the PoW target,
    /// 2. the hash reproduces bit-exactly from the other fields,
    /// 3. the embedded public key accepts the signature over
    ///    `peer_id || timestamp`.
    pub fn verify(&self) -> Result<(), SczeroError> {
        if !self.hash.starts_with(&difficulty_target()) {
            return Err(SczeroError::PowInsufficient);
        }
        if self.compute_hash() != self.hash {
            return Err(SczeroError::HashMismatch);
        }
        let preimage = sign_preimage(&self.peer_id, self.timestamp);
        if !verify_marshalled(&self.pub_key, preimage.as_bytes(), &self.signature)? {
            return Err(SczeroError::SignatureInvalid);
        }
        Ok(())
    }

    /// JSON wire form, as carried in AUTH and RESPONSE payloads.
    pub fn to_wire(&self) -> Result<String, SczeroError> {
        serde_json::to_string(self).map_err(|e| SczeroError::Serialization(e.to_string()))
    }

    pub fn from_wire(data: &str) -> Result<Self, SczeroError> {
        serde_json::from_str(data).map_err(|e| SczeroError::Serialization(e.to_string()))
    }
}

/// Pre-image for the identity signature: `peer_id || decimal(timestamp)`.
pub fn sign_preimage(peer_id: &str, timestamp: Timestamp) -> String {
    format!("{peer_id}{timestamp}")
}

/// The required hash prefix: `'0' × DIFFICULTY`.
pub fn difficulty_target() -> String {
    "0".repeat(DIFFICULTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mint() -> (NodeKeypair, IdentityBlock) {
        let kp = NodeKeypair::generate();
        let peer_id = kp.peer_id().to_string();
        let block = IdentityBlock::create(&kp, peer_id).unwrap();
        (kp, block)
    }

    #[test]
    fn mined_block_verifies() {
        let (_, block) = mint();
        assert!(block.hash.starts_with("000"));
        block.verify().unwrap();
    }

    #[test]
    fn honest_rehash_without_work_is_insufficient() {
        let (_, mut block) = mint();
        // Walk forward until the honestly recomputed hash loses the prefix.
        loop {
            block.nonce += 1;
            block.hash = block.compute_hash();
            if !block.hash.starts_with(&difficulty_target()) {
                break;
            }
        }
        assert!(matches!(block.verify(), Err(SczeroError::PowInsufficient)));
    }

    #[test]
    fn mutated_field_breaks_the_hash() {
        let (_, mut block) = mint();
        block.timestamp += 1;
        assert!(matches!(block.verify(), Err(SczeroError::HashMismatch)));
    }

    #[test]
    fn mutated_peer_id_breaks_the_hash() {
        let (_, mut block) = mint();
        block.peer_id.push('x');
        assert!(matches!(block.verify(), Err(SczeroError::HashMismatch)));
    }

    #[test]
    fn foreign_signature_is_spoofing() {
        // Valid PoW and a consistent hash, but the signature comes from a
        // different private key than the one embedded in the block.
        let victim = NodeKeypair::generate();
        let attacker = NodeKeypair::generate();
        let peer_id = victim.peer_id().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let forged_sig = attacker
            .sign(sign_preimage(&peer_id, timestamp).as_bytes())
            .unwrap();

        let mut block = IdentityBlock {
            timestamp,
            peer_id,
            pub_key: victim.public_bytes(),
            signature: forged_sig,
            hash: String::new(),
            nonce: 0,
        };
        block.mine();
        assert!(matches!(block.verify(), Err(SczeroError::SignatureInvalid)));
    }

    #[test]
    fn unparseable_key_is_rejected_as_such() {
        let kp = NodeKeypair::generate();
        let peer_id = kp.peer_id().to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let signature = kp
            .sign(sign_preimage(&peer_id, timestamp).as_bytes())
            .unwrap();
        let mut block = IdentityBlock {
            timestamp,
            peer_id,
            pub_key: b"garbage".to_vec(),
            signature,
            hash: String::new(),
            nonce: 0,
        };
        block.mine();
        assert!(matches!(block.verify(), Err(SczeroError::BadPublicKey(_))));
    }

    #[test]
    fn wire_round_trip_is_lossless() {
        let (_, block) = mint();
        let wire = block.to_wire().unwrap();
        assert_eq!(IdentityBlock::from_wire(&wire).unwrap(), block);
    }

    #[test]
    fn wire_form_uses_the_agreed_field_names() {
        let (_, block) = mint();
        let value: serde_json::Value =
            serde_json::from_str(&block.to_wire().unwrap()).unwrap();
        for field in ["timestamp", "peer_id", "pub_key", "signature", "hash", "nonce"] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
    }
}
