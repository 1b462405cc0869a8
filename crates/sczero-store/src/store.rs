use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sczero_core::constants::{HISTORY_FILE, IDENTITY_FILE, KEY_FILE};
use sczero_core::types::ChatMessage;
use sczero_core::SczeroError;
use sczero_crypto::{derive_storage_key, open, seal, NodeKeypair};
use sczero_identity::IdentityBlock;
use tracing::info;

/// Sealed persistence for the three node files.
///
/// The key file holds the hex-encoded raw private key; everything else is
/// sealed under SHA-256 of those raw bytes, so a copied disk image is
/// useless without the identity key.
pub struct PersistentStore {
    dir: PathBuf,
}

impl PersistentStore {
    /// A store rooted at `dir` (normally the working directory).
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    // ── Signing key ──────────────────────────────────────────────────────────

    /// Load the signing key, generating and persisting a fresh one on first
    /// launch. The key file is written mode 0600.
    pub fn load_or_generate_key(&self) -> Result<NodeKeypair, SczeroError> {
        let path = self.dir.join(KEY_FILE);
        if path.exists() {
            let text = fs::read_to_string(&path).map_err(storage_err)?;
            let raw = hex::decode(text.trim())
                .map_err(|e| SczeroError::Key(format!("malformed key file: {e}")))?;
            return NodeKeypair::from_raw_bytes(raw);
        }

        info!("generating new identity key");
        let keypair = NodeKeypair::generate();
        let raw = keypair.raw_bytes()?;
        self.write_atomic(KEY_FILE, hex::encode(raw.as_slice()).as_bytes(), 0o600)?;
        Ok(keypair)
    }

    // ── Self identity block ──────────────────────────────────────────────────

    pub fn save_self_block(
        &self,
        keypair: &NodeKeypair,
        block: &IdentityBlock,
    ) -> Result<(), SczeroError> {
        let json = serde_json::to_vec(block).map_err(serde_err)?;
        let sealed = seal(&self.storage_key(keypair)?, &json)?;
        self.write_atomic(IDENTITY_FILE, &sealed, 0o600)
    }

    /// `NotFound` when no block has been mined yet; `DecryptFailure` when
    /// the file exists but does not open under the current key.
    pub fn load_self_block(&self, keypair: &NodeKeypair) -> Result<IdentityBlock, SczeroError> {
        let json = self.read_sealed(IDENTITY_FILE, keypair)?;
        serde_json::from_slice(&json).map_err(serde_err)
    }

    // ── Chat history ─────────────────────────────────────────────────────────

    pub fn save_history(
        &self,
        keypair: &NodeKeypair,
        messages: &[ChatMessage],
    ) -> Result<(), SczeroError> {
        let json = serde_json::to_vec(messages).map_err(serde_err)?;
        let sealed = seal(&self.storage_key(keypair)?, &json)?;
        self.write_atomic(HISTORY_FILE, &sealed, 0o644)
    }

    pub fn load_history(&self, keypair: &NodeKeypair) -> Result<Vec<ChatMessage>, SczeroError> {
        let json = self.read_sealed(HISTORY_FILE, keypair)?;
        serde_json::from_slice(&json).map_err(serde_err)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn storage_key(&self, keypair: &NodeKeypair) -> Result<[u8; 32], SczeroError> {
        Ok(derive_storage_key(keypair.raw_bytes()?.as_slice()))
    }

    fn read_sealed(&self, name: &str, keypair: &NodeKeypair) -> Result<Vec<u8>, SczeroError> {
        let path = self.dir.join(name);
        let sealed = fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                SczeroError::NotFound(name.to_string())
            } else {
                storage_err(e)
            }
        })?;
        open(&self.storage_key(keypair)?, &sealed)
    }

    /// Crash-tolerant write: the bytes land in a temp file in the same
    /// directory which is then renamed over the target, so a crash leaves
    /// either the previous file or the new one, never a mix.
    fn write_atomic(&self, name: &str, bytes: &[u8], mode: u32) -> Result<(), SczeroError> {
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        fs::write(&tmp, bytes).map_err(storage_err)?;
        set_mode(&tmp, mode).map_err(storage_err)?;
        fs::rename(&tmp, &target).map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

fn storage_err(e: io::Error) -> SczeroError {
    SczeroError::Storage(e.to_string())
}

fn serde_err(e: serde_json::Error) -> SczeroError {
    SczeroError::Serialization(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, PersistentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::open(dir.path());
        (dir, store)
    }

    #[test]
    fn fresh_launch_generates_and_persists_the_key() {
        let (dir, store) = store();
        let keypair = store.load_or_generate_key().unwrap();
        assert!(dir.path().join(KEY_FILE).exists());

        let reloaded = store.load_or_generate_key().unwrap();
        assert_eq!(keypair.peer_id(), reloaded.peer_id());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, store) = store();
        store.load_or_generate_key().unwrap();
        let mode = fs::metadata(dir.path().join(KEY_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn self_block_round_trips_sealed() {
        let (_dir, store) = store();
        let keypair = store.load_or_generate_key().unwrap();
        let block = IdentityBlock::create(&keypair, keypair.peer_id().to_string()).unwrap();

        store.save_self_block(&keypair, &block).unwrap();
        let loaded = store.load_self_block(&keypair).unwrap();
        assert_eq!(loaded, block);
    }

    #[test]
    fn missing_files_are_not_found_not_decrypt_failures() {
        let (_dir, store) = store();
        let keypair = store.load_or_generate_key().unwrap();
        assert!(matches!(
            store.load_self_block(&keypair),
            Err(SczeroError::NotFound(_))
        ));
        assert!(matches!(
            store.load_history(&keypair),
            Err(SczeroError::NotFound(_))
        ));
    }

    #[test]
    fn history_round_trips_sealed() {
        let (_dir, store) = store();
        let keypair = store.load_or_generate_key().unwrap();
        let messages = vec![
            ChatMessage::now("Me", "hello"),
            ChatMessage::now("16Uiu2HAm", "hi back"),
        ];
        store.save_history(&keypair, &messages).unwrap();
        assert_eq!(store.load_history(&keypair).unwrap(), messages);
    }

    #[test]
    fn history_under_a_replaced_key_fails_to_open() {
        let (dir, store) = store();
        let keypair = store.load_or_generate_key().unwrap();
        store
            .save_history(&keypair, &[ChatMessage::now("Me", "remember this")])
            .unwrap();

        // Simulate a swapped-out identity.key: a new key, same files.
        fs::remove_file(dir.path().join(KEY_FILE)).unwrap();
        let other = store.load_or_generate_key().unwrap();
        assert!(matches!(
            store.load_history(&other),
            Err(SczeroError::DecryptFailure)
        ));
    }

    #[test]
    fn sealed_files_are_ciphertext() {
        let (dir, store) = store();
        let keypair = store.load_or_generate_key().unwrap();
        store
            .save_history(&keypair, &[ChatMessage::now("Me", "plaintext probe")])
            .unwrap();
        let raw = fs::read(dir.path().join(HISTORY_FILE)).unwrap();
        let haystack = String::from_utf8_lossy(&raw);
        assert!(!haystack.contains("plaintext probe"));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let (dir, store) = store();
        let keypair = store.load_or_generate_key().unwrap();
        store.save_history(&keypair, &[]).unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
