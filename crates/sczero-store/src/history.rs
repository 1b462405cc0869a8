use sczero_core::types::ChatMessage;
use tokio::sync::Mutex;

/// Append-only in-memory chat log, flushed to disk as one sealed blob on
/// `/close` and reloaded whole on the next start.
#[derive(Default)]
pub struct ChatLog {
    messages: Mutex<Vec<ChatMessage>>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message stamped with the current wall-clock time and return
    /// the stored entry.
    pub async fn append(
        &self,
        sender: impl Into<String>,
        content: impl Into<String>,
    ) -> ChatMessage {
        let message = ChatMessage::now(sender, content);
        self.messages.lock().await.push(message.clone());
        message
    }

    /// A shallow copy of the log for persistence or display.
    pub async fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.lock().await.clone()
    }

    /// Replace the whole log (used when loading history from disk).
    pub async fn replace(&self, messages: Vec<ChatMessage>) {
        *self.messages.lock().await = messages;
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }
}
