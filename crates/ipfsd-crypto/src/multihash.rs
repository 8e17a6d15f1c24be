//! Hash algorithm registry for multihash-backed CID construction.
//!
//! This is the process-wide constant registry: a small, closed
//! enumeration of the multihash algorithm codes the node core
//! understands, each wired to a concrete digest implementation. New
//! algorithms require a code change here, same as adding a new CID
//! codec.

use crate::{CryptoError, Result};
use digest::Digest;
use serde::{Deserialize, Serialize};

/// `sha2-256` multicodec code.
pub const SHA2_256_CODE: u64 = 0x12;
/// `blake2b-256` multicodec code.
pub const BLAKE2B_256_CODE: u64 = 0xb220;
/// `identity` multicodec code (content is the digest itself).
pub const IDENTITY_CODE: u64 = 0x00;

type Blake2b256 = blake2::Blake2b<digest::consts::U32>;

/// A hash algorithm recognized by the node core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA2-256, the default algorithm (`sha2-256`).
    Sha2_256,
    /// BLAKE2b, truncated to 256 bits (`blake2b-256`).
    Blake2b256,
    /// Identity: the "digest" is the raw bytes themselves, used to inline
    /// small blocks directly into their CID.
    Identity,
}

impl HashAlgorithm {
    /// Default hash algorithm used when none is specified.
    pub const DEFAULT: HashAlgorithm = HashAlgorithm::Sha2_256;

    /// The multicodec code for this algorithm.
    pub fn code(&self) -> u64 {
        match self {
            HashAlgorithm::Sha2_256 => SHA2_256_CODE,
            HashAlgorithm::Blake2b256 => BLAKE2B_256_CODE,
            HashAlgorithm::Identity => IDENTITY_CODE,
        }
    }

    /// Parse a [`HashAlgorithm`] from its multicodec code.
    pub fn from_code(code: u64) -> Result<Self> {
        match code {
            SHA2_256_CODE => Ok(HashAlgorithm::Sha2_256),
            BLAKE2B_256_CODE => Ok(HashAlgorithm::Blake2b256),
            IDENTITY_CODE => Ok(HashAlgorithm::Identity),
            other => Err(CryptoError::UnknownAlgorithm(other)),
        }
    }

    /// Human readable multicodec name, as used in CLI chunker options
    /// (e.g. `hash=blake2b-256`).
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha2_256 => "sha2-256",
            HashAlgorithm::Blake2b256 => "blake2b-256",
            HashAlgorithm::Identity => "identity",
        }
    }

    /// Parse from a multicodec name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "sha2-256" => Ok(HashAlgorithm::Sha2_256),
            "blake2b-256" => Ok(HashAlgorithm::Blake2b256),
            "identity" => Ok(HashAlgorithm::Identity),
            _ => Err(CryptoError::InvalidKey(format!(
                        "unknown hash algorithm name: {name}"
                    ))),
        }
    }

    /// Compute the digest of `data` under this algorithm. For
    /// [`HashAlgorithm::Identity`] the "digest" is `data` itself.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha2_256 => sha2::Sha256::digest(data).to_vec(),
            HashAlgorithm::Blake2b256 => Blake2b256::digest(data).to_vec(),
            HashAlgorithm::Identity => data.to_vec(),
        }
    }

    /// A [`multihash::Multihash`] wrapping the digest of `data`.
    pub fn multihash(&self, data: &[u8]) -> Result<multihash::Multihash<64>> {
        let digest = self.digest(data);
        multihash::Multihash::wrap(self.code(), &digest)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Verify that `data` hashes to `expected` under this algorithm.
    pub fn verify(&self, data: &[u8], expected: &[u8]) -> bool {
        self.digest(data) == expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha2_256_roundtrips_through_code() {
        let alg = HashAlgorithm::Sha2_256;
        assert_eq!(HashAlgorithm::from_code(alg.code()).unwrap(), alg);
    }

    #[test]
    fn blake2b_256_digest_is_32_bytes() {
        let digest = HashAlgorithm::Blake2b256.digest(b"hello world");
        assert_eq!(digest.len(), 32);
    }

    #[test]
    fn identity_digest_is_input() {
        let data = b"blorb";
        assert_eq!(HashAlgorithm::Identity.digest(data), data.to_vec());
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(HashAlgorithm::from_code(0xDEAD).is_err());
    }

    #[test]
    fn sha2_256_is_deterministic() {
        let a = HashAlgorithm::Sha2_256.digest(b"determinism");
        let b = HashAlgorithm::Sha2_256.digest(b"determinism");
        assert_eq!(a, b);
    }

    #[test]
    fn verify_detects_tamper() {
        let alg = HashAlgorithm::Sha2_256;
        let digest = alg.digest(b"original");
        assert!(alg.verify(b"original", &digest));
        assert!(!alg.verify(b"tampered", &digest));
    }
}
