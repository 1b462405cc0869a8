use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use sczero_core::SczeroError;

use crate::hash::sha256;

/// GCM nonce length in bytes, prefixed to every sealed blob.
pub const NONCE_LEN: usize = 12;

/// Derive the at-rest storage key: SHA-256 of the raw private-key bytes,
/// used directly as an AES-256 key. The signing key is the sole secret.
pub fn derive_storage_key(private_key_raw: &[u8]) -> [u8; 32] {
    sha256(private_key_raw)
}

/// Seal `plaintext` under `key`. Layout: `nonce || ciphertext || tag`,
/// with a fresh random nonce per call.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, SczeroError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| SczeroError::Storage("sealing failed".into()))?;
    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Open a sealed blob. Truncated input, a wrong key, and tampering all
/// collapse into the single `DecryptFailure` variant.
pub fn open(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>, SczeroError> {
    if blob.len() < NONCE_LEN {
        return Err(SczeroError::DecryptFailure);
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| SczeroError::DecryptFailure)
}
