//! sczero-store
//!
//! Sealed on-disk persistence for the node's three working-directory files
//! (signing key, self identity block, chat history) plus the in-memory
//! [`ChatLog`] those sealed writes snapshot from.

pub mod history;
pub mod store;

pub use history::ChatLog;
pub use store::PersistentStore;
