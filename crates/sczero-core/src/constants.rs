//! ─── SC-Zero Protocol Constants ─────────────────────────────────────────────
//!
//! Every peer mines one identity block at first launch and presents it on
//! every stream it opens. These constants fix the cost of that proof and the
//! wire protocol both sides must speak.

// ── Wire protocol ────────────────────────────────────────────────────────────

/// Application protocol spoken over every peer stream.
pub const PROTOCOL_ID: &str = "/sc-zero/2.0.0";

// ── Proof-of-Work ────────────────────────────────────────────────────────────

/// Identity-block difficulty: leading `'0'` hex characters required on the
/// block hash. Each additional character multiplies mining cost by 16.
pub const DIFFICULTY: usize = 3;

// ── Persistence (working-directory file names) ───────────────────────────────

/// Hex-encoded raw private signing key, mode 0600.
pub const KEY_FILE: &str = "identity.key";

/// AEAD-sealed JSON of the node's own identity block, mode 0600.
pub const IDENTITY_FILE: &str = "my_identity.enc";

/// AEAD-sealed JSON array of chat messages, mode 0644.
pub const HISTORY_FILE: &str = "chat_history.enc";

// ── Channels & timeouts ──────────────────────────────────────────────────────

/// Capacity of the outbound-text and log channels between UI and sessions.
pub const CHANNEL_CAPACITY: usize = 100;

/// Dial attempts are abandoned after this many seconds.
pub const DIAL_TIMEOUT_SECS: u64 = 10;
