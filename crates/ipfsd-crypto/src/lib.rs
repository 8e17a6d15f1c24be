//! Cryptographic primitives for the ipfsd node core.
//!
//! Three responsibilities live here, each a thin wrapper over a single
//! vetted crate rather than a home-grown implementation:
//!
//! - [`multihash`] names and computes the digests the content-addressing
//! layer turns into CIDs (sha2-256, blake2b-256, identity).
//! - [`keystore`] is the signing-key collaborator the naming module
//! calls to produce and verify IPNS record signatures.
//! - [`symmetric`] seals and opens `cms`-codec UnixFS leaves.

pub mod error;
pub mod keystore;
pub mod multihash;
pub mod symmetric;

pub use error::{CryptoError, Result};
pub use keystore::{KeyInfo, KeyType, Keystore, MemoryKeystore};
pub use multihash::HashAlgorithm;
pub use symmetric::ProtectionKey;
