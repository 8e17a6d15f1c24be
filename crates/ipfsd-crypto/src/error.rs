//! Error types for the ipfsd-crypto crate

use thiserror::Error;

/// Result type alias using [`CryptoError`]
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic or keystore operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key generation failed
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Invalid key format or length
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Signature verification failed
    #[error("signature verification failed")]
    SignatureVerification,

    /// Unknown hash algorithm code
    #[error("unknown hash algorithm code: 0x{0:x}")]
    UnknownAlgorithm(u64),

    /// Digest length did not match what the algorithm produces
    #[error("invalid digest length for algorithm {algorithm}: expected {expected}, got {actual}")]
    InvalidDigestLength {
        algorithm: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Key not found in the keystore
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Key with that name already exists
    #[error("key already exists: {0}")]
    KeyAlreadyExists(String),

    /// Hex decode error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
