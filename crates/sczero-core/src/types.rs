use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Sender name recorded for locally originated chat text.
pub const LOCAL_SENDER: &str = "Me";

// ── ChatMessage ──────────────────────────────────────────────────────────────

/// One entry in the chat log.
///
/// `sender` is [`LOCAL_SENDER`] for text the local user typed, or the remote
/// peer id for received text. The log records what the user *tried* to send;
/// it is not a delivery receipt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a message stamped with the current wall-clock time.
    pub fn now(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Abbreviate a peer id for display: the first `len` characters followed by
/// an ellipsis. Ids at or under `len` characters are returned whole.
pub fn short_peer_id(peer_id: &str, len: usize) -> String {
    match peer_id.char_indices().nth(len) {
        Some((idx, _)) => format!("{}…", &peer_id[..idx]),
        None => peer_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_truncates_long_ids() {
        let id = "16Uiu2HAm7ykpUq5W4xrLJZRUnVqCBn8favEparAFk1ArfN9pLbQa";
        let short = short_peer_id(id, 8);
        assert_eq!(short, "16Uiu2HA…");
    }

    #[test]
    fn short_id_keeps_short_ids_whole() {
        assert_eq!(short_peer_id("Me", 8), "Me");
    }
}
