use serde::{Deserialize, Serialize};

/// The typed envelope carried one-per-line on the wire.
///
/// Serializes as `{"type": "...", "payload": "..."}`. The payload is always
/// a string; AUTH, RESPONSE and GOSSIP embed JSON *inside* that string, so
/// the outer encoder escapes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "UPPERCASE")]
pub enum NetworkPacket {
    /// The sender's own identity block, wire-encoded.
    Auth(String),
    /// JSON array of peer ids the sender has verified.
    Gossip(String),
    /// A peer id whose identity block the sender wants.
    Request(String),
    /// A wire-encoded identity block answering a REQUEST.
    Response(String),
    /// Chat text.
    Msg(String),
}

impl NetworkPacket {
    /// Encode as one newline-terminated frame.
    pub fn to_line(&self) -> String {
        let mut line =
            serde_json::to_string(self).expect("packet serialization is infallible");
        line.push('\n');
        line
    }

    /// Decode one frame. Malformed frames yield `None`; the session drops
    /// them without tearing down.
    pub fn from_line(line: &str) -> Option<Self> {
        serde_json::from_str(line.trim()).ok()
    }
}
