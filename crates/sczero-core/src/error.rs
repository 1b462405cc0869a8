use thiserror::Error;

#[derive(Debug, Error)]
pub enum SczeroError {
    // ── Identity rejection ───────────────────────────────────────────────────
    #[error("PoW failed: insufficient work")]
    PowInsufficient,

    #[error("hash mismatch: block contents do not reproduce the stored hash")]
    HashMismatch,

    #[error("bad public key: {0}")]
    BadPublicKey(String),

    #[error("signature invalid: spoofing attempt")]
    SignatureInvalid,

    // ── Storage ──────────────────────────────────────────────────────────────
    /// Sealed data failed to open. Deliberately covers truncation, a wrong
    /// key, and tampering without distinguishing them.
    #[error("decryption failed")]
    DecryptFailure,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key error: {0}")]
    Key(String),

    // ── Network ──────────────────────────────────────────────────────────────
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("stream failed: {0}")]
    StreamFailed(String),
}
