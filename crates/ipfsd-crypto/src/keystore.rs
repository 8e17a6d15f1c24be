//! Keystore: the node's signing-key collaborator.
//!
//! Exposes the operations the naming module needs when publishing a
//! record: find a key by name, fetch its public bytes, create a new
//! key, and sign a payload with it. Defined as a trait so the naming
//! crate depends only on the interface, plus an in-process
//! Ed25519-backed implementation good enough to run a single node.

use crate::{CryptoError, Result};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use parking_lot::RwLock;
use rand_core::OsRng;
use std::collections::HashMap;
use std::sync::Arc;
use zeroize::Zeroize;

/// The kind of key material a keystore entry holds. The node core only
/// ever mints Ed25519 keys; the variant exists so `create_key` callers
/// can be explicit about intent and so the keystore can reject requests
/// for algorithms it does not support.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyType {
    Ed25519,
}

/// A named keypair held by a [`Keystore`].
#[derive(Clone)]
pub struct KeyInfo {
    pub name: String,
    pub key_type: KeyType,
    pub public_key: Vec<u8>,
}

/// The signing-key collaborator.
///
/// Implementations are expected to be internally synchronized; the
/// trait takes `&self` throughout so it can be shared behind an `Arc`
/// across the naming manager's tasks.
#[async_trait::async_trait]
pub trait Keystore: Send + Sync {
    /// Look up a key's public info by name, e.g. `"self"` for the
    /// node's own identity key.
    async fn find_key_by_name(&self, name: &str) -> Result<KeyInfo>;

    /// Fetch the raw private key bytes for `name`. Callers use this to
    /// construct a signer; the bytes are zeroized by the caller's
    /// drop once no longer needed.
    async fn get_private_key(&self, name: &str) -> Result<Vec<u8>>;

    /// Generate and store a new key under `name`.
    async fn create_key(&self, name: &str, key_type: KeyType) -> Result<KeyInfo>;

    /// Sign `payload` with the key named `name`, returning the raw
    /// signature bytes.
    async fn compute_signature(&self, name: &str, payload: &[u8]) -> Result<Vec<u8>>;
}

/// A process-local, in-memory keystore. This is the only `Keystore`
/// implementation the node core ships; it is sufficient for a single
/// node's own identity and any additional IPNS keys it mints, and is
/// also what naming-manager tests exercise directly.
#[derive(Default)]
pub struct MemoryKeystore {
    keys: RwLock<HashMap<String, SigningKey>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Wrap this keystore in an `Arc`, the form naming-manager
    /// constructors expect.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert a pre-existing signing key under `name`, overwriting any
    /// prior key of that name. Used to seed a node's `"self"` identity
    /// key from the on-disk repo config at startup.
    pub fn insert(&self, name: &str, signing_key: SigningKey) {
        self.keys.write().insert(name.to_string(), signing_key);
    }

    fn info_for(name: &str, key: &SigningKey) -> KeyInfo {
        KeyInfo {
            name: name.to_string(),
            key_type: KeyType::Ed25519,
            public_key: key.verifying_key().to_bytes().to_vec(),
        }
    }
}

#[async_trait::async_trait]
impl Keystore for MemoryKeystore {
    async fn find_key_by_name(&self, name: &str) -> Result<KeyInfo> {
        self.keys
        .read()
        .get(name)
        .map(|k| Self::info_for(name, k))
        .ok_or_else(|| CryptoError::KeyNotFound(name.to_string()))
    }

    async fn get_private_key(&self, name: &str) -> Result<Vec<u8>> {
        self.keys
        .read()
        .get(name)
        .map(|k| k.to_bytes().to_vec())
        .ok_or_else(|| CryptoError::KeyNotFound(name.to_string()))
    }

    async fn create_key(&self, name: &str, key_type: KeyType) -> Result<KeyInfo> {
        let KeyType::Ed25519 = key_type;
        let mut keys = self.keys.write();
        if keys.contains_key(name) {
            return Err(CryptoError::KeyAlreadyExists(name.to_string()));
        }
        let signing_key = SigningKey::generate(&mut OsRng);
        let info = Self::info_for(name, &signing_key);
        keys.insert(name.to_string(), signing_key);
        Ok(info)
    }

    async fn compute_signature(&self, name: &str, payload: &[u8]) -> Result<Vec<u8>> {
        let keys = self.keys.read();
        let signing_key = keys
        .get(name)
        .ok_or_else(|| CryptoError::KeyNotFound(name.to_string()))?;
        Ok(signing_key.sign(payload).to_bytes().to_vec())
    }
}

/// Verify a signature produced by [`Keystore::compute_signature`]
/// against a raw Ed25519 public key. Naming-record validation calls
/// this directly; it needs no keystore state, only the embedded
/// public key bytes from the record itself.
pub fn verify_signature(public_key: &[u8], payload: &[u8], signature: &[u8]) -> Result<()> {
    let public_key: [u8; 32] = public_key
    .try_into()
    .map_err(|_| CryptoError::InvalidKey("public key must be 32 bytes".into()))?;
    let verifying_key = VerifyingKey::from_bytes(&public_key)
    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let signature: [u8; 64] = signature
    .try_into()
    .map_err(|_| CryptoError::InvalidKey("signature must be 64 bytes".into()))?;
    let signature = ed25519_dalek::Signature::from_bytes(&signature);
    verifying_key
    .verify_strict(payload, &signature)
    .map_err(|_| CryptoError::SignatureVerification)
}

impl Drop for MemoryKeystore {
    fn drop(&mut self) {
        for (_, key) in self.keys.write().drain() {
            let mut bytes = key.to_bytes();
            bytes.zeroize();
        }
    }
}
