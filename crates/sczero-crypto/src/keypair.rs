use libp2p::identity::{self, Keypair, PublicKey};
use libp2p::PeerId;
use sczero_core::SczeroError;
use zeroize::Zeroizing;

/// The node's long-term secp256k1 signing identity.
///
/// Wraps a libp2p keypair so the transport peer id and the identity-block
/// `peer_id` are derived from the same key. The marshalled public key is
/// self-describing (protobuf with an algorithm tag), so a verifier can be
/// reconstructed from the `pub_key` field of a block alone.
#[derive(Clone)]
pub struct NodeKeypair {
    inner: Keypair,
}

impl NodeKeypair {
    /// Generate a fresh secp256k1 keypair.
    pub fn generate() -> Self {
        Self {
            inner: Keypair::generate_secp256k1(),
        }
    }

    /// Restore a keypair from raw secret-key bytes (e.g. the key file).
    /// The input buffer is zeroed as a side effect.
    pub fn from_raw_bytes(mut bytes: Vec<u8>) -> Result<Self, SczeroError> {
        let secret = identity::secp256k1::SecretKey::try_from_bytes(&mut bytes)
            .map_err(|e| SczeroError::Key(e.to_string()))?;
        Ok(Self {
            inner: identity::secp256k1::Keypair::from(secret).into(),
        })
    }

    /// Raw secret-key bytes for persistence. Zeroed on drop.
    pub fn raw_bytes(&self) -> Result<Zeroizing<Vec<u8>>, SczeroError> {
        let kp = self
            .inner
            .clone()
            .try_into_secp256k1()
            .map_err(|e| SczeroError::Key(e.to_string()))?;
        Ok(Zeroizing::new(kp.secret().to_bytes().to_vec()))
    }

    /// Sign `message` with the secret key.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SczeroError> {
        self.inner
            .sign(message)
            .map_err(|e| SczeroError::Key(e.to_string()))
    }

    /// Marshalled (self-describing) public key bytes.
    pub fn public_bytes(&self) -> Vec<u8> {
        self.inner.public().encode_protobuf()
    }

    /// Transport peer id derived from the public key.
    pub fn peer_id(&self) -> PeerId {
        self.inner.public().to_peer_id()
    }

    /// Borrow the underlying libp2p keypair (for swarm construction).
    pub fn libp2p_keypair(&self) -> &Keypair {
        &self.inner
    }
}

impl std::fmt::Debug for NodeKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeKeypair {{ peer_id: {} }}", self.peer_id())
    }
}

/// Verify `signature` over `message` against marshalled public-key bytes.
///
/// `Err(BadPublicKey)` if the key does not parse; `Ok(false)` if it parses
/// but the signature does not check out.
pub fn verify_marshalled(
    pub_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<bool, SczeroError> {
    let pk = PublicKey::try_decode_protobuf(pub_key)
        .map_err(|e| SczeroError::BadPublicKey(e.to_string()))?;
    Ok(pk.verify(message, signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let kp = NodeKeypair::generate();
        let msg = b"prove this identity";
        let sig = kp.sign(msg).unwrap();
        assert!(verify_marshalled(&kp.public_bytes(), msg, &sig).unwrap());
    }

    #[test]
    fn wrong_key_rejects() {
        let kp = NodeKeypair::generate();
        let other = NodeKeypair::generate();
        let sig = kp.sign(b"hello").unwrap();
        assert!(!verify_marshalled(&other.public_bytes(), b"hello", &sig).unwrap());
    }

    #[test]
    fn garbage_public_key_is_an_error() {
        let err = verify_marshalled(b"not a key", b"msg", b"sig").unwrap_err();
        assert!(matches!(err, SczeroError::BadPublicKey(_)));
    }

    #[test]
    fn raw_bytes_round_trip_preserves_peer_id() {
        let kp = NodeKeypair::generate();
        let raw = kp.raw_bytes().unwrap();
        let restored = NodeKeypair::from_raw_bytes(raw.to_vec()).unwrap();
        assert_eq!(kp.peer_id(), restored.peer_id());
    }
}
