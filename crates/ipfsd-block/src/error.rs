//! Error types for the ipfsd-block crate

use cid::Cid;
use thiserror::Error;

/// Result type alias using [`BlockError`]
pub type Result<T> = std::result::Result<T, BlockError>;

/// Errors surfaced by the block store, pin set, chunker/DAG builder, and
/// archive codec.
#[derive(Error, Debug)]
pub enum BlockError {
    /// No block stored for this CID.
    #[error("block not found: {0}")]
    NotFound(Cid),

    /// CID bytes could not be parsed.
    #[error("invalid CID: {0}")]
    InvalidCid(String),

    /// An unrecognized linked-data codec was requested. Codecs are a
    /// closed enumeration.
    #[error("unknown codec: 0x{0:x}")]
    UnknownCodec(u64),

    /// Block exceeds the 2 MiB ceiling and `allow-big` was not set.
    #[error("block too large: {size} bytes exceeds limit of {max} bytes")]
    BlockTooLarge { size: usize, max: usize },

    /// The block's bytes did not hash to the CID's declared digest.
    #[error("hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },

    /// No pin recorded for this CID.
    #[error("not pinned: {0}")]
    NotPinned(Cid),

    /// A pin already exists for this CID.
    #[error("already pinned: {0}")]
    AlreadyPinned(Cid),

    /// A dag-pb node could not be decoded.
    #[error("malformed dag-pb node: {0}")]
    MalformedDagNode(String),

    /// Archive header or framing did not match the expected shape.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// Unsupported CAR version.
    #[error("unsupported archive version: {0}")]
    UnsupportedArchiveVersion(u64),

    /// The operation was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,

    /// Repository corruption detected on integrity verification.
    #[error("corrupt repository: {0}")]
    CorruptRepository(String),

    /// A cryptographic primitive (hashing, signing, AEAD) failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] ipfsd_crypto::CryptoError),

    /// Underlying filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// DAG-CBOR encoding failure.
    #[error("DAG-CBOR encode error: {0}")]
    DagCborEncode(String),

    /// DAG-CBOR decoding failure.
    #[error("DAG-CBOR decode error: {0}")]
    DagCborDecode(String),

    /// Protobuf decode failure (dag-pb / bitswap wire structs).
    #[error("protobuf decode error: {0}")]
    ProtoDecode(#[from] prost::DecodeError),
}
