//! AEAD encryption for UnixFS `cms`-codec leaves.
//!
//! The chunker only ever produces plaintext `raw` leaves today, but the
//! UnixFS module's codec table reserves a `cms` (ciphertext) leaf codec
//! for encrypted storage, and the block layer must be able to decrypt
//! one given the protection key. This module supplies that primitive:
//! a single-key, single-algorithm AEAD wrapper over ChaCha20-Poly1305.

use crate::{CryptoError, Result};
use chacha20poly1305::{
    aead::{Aead as _, AeadCore, KeyInit},
    ChaCha20Poly1305, Key,
};
use rand_core::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length in bytes of a ChaCha20-Poly1305 key.
pub const KEY_LEN: usize = 32;
/// Length in bytes of a ChaCha20-Poly1305 nonce.
pub const NONCE_LEN: usize = 12;

/// A symmetric protection key for `cms`-codec leaves. Zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct ProtectionKey([u8; KEY_LEN]);

impl ProtectionKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Wrap existing key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for ProtectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectionKey").field("0", &"..").finish()
    }
}

/// A `cms`-leaf ciphertext: a random nonce prepended to the AEAD
/// ciphertext-plus-tag, the layout `encrypt`/`decrypt` agree on for the
/// bytes a `cms` block stores on disk.
pub fn encrypt(key: &ProtectionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let mut ciphertext = cipher
    .encrypt(&nonce, plaintext)
    .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let mut out = nonce.to_vec();
    out.append(&mut ciphertext);
    Ok(out)
}

/// Decrypt bytes produced by [`encrypt`].
pub fn decrypt(key: &ProtectionKey, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(CryptoError::Decryption("ciphertext shorter than nonce".into()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
    .decrypt(nonce.into(), ciphertext)
    .map_err(|e| CryptoError::Decryption(e.to_string()))
}

impl Zeroize for ProtectionKey {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}
