//! Error types for the ipfsd-naming crate

use thiserror::Error;

/// Result type alias using [`NamingError`]
pub type Result<T> = std::result::Result<T, NamingError>;

/// Errors surfaced by the name record manager and routing facade.
/// Composed from the two crates naming sits on top of, following
/// `ipfsd-block`/`ipfsd-exchange`'s `#[from]`-composition style.
#[derive(Error, Debug)]
pub enum NamingError {
    /// A wire-format name record was missing a required field or had a
    /// field that did not parse.
    #[error("malformed name record: {0}")]
    MalformedRecord(String),

    /// Signature verification against the record's claimed key failed.
    #[error("name record signature is invalid")]
    SignatureInvalid,

    /// No record has ever been published for this name.
    #[error("name not found: {0}")]
    NotFound(String),

    /// The record's validity timestamp has passed.
    #[error("name record expired")]
    Expired,

    /// A record arrived with a sequence number no greater than the
    /// last one admitted for its publisher — a stale or replayed
    /// record, rejected per its monotonicity rule.
    #[error("stale record: sequence {incoming} is not greater than last-admitted {last_admitted}")]
    StaleSequence { incoming: u64, last_admitted: u64 },

    /// `resolve` exceeded its recursion depth without reaching an
    /// `/ipfs/...` path.
    #[error("name resolution exceeded depth limit")]
    RecursionLimitExceeded,

    /// The signing key named for a `publish` call does not exist.
    #[error("signing key not found: {0}")]
    KeyNotFound(String),

    /// A routing collaborator (DHT or PubSub) reported failure.
    #[error("routing error: {0}")]
    Routing(String),

    /// Underlying block-store failure, e.g. while resolving a
    /// `/ipfs/...` path segment.
    #[error("block store error: {0}")]
    Block(#[from] ipfsd_block::BlockError),

    /// Underlying keystore/signature failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] ipfsd_crypto::CryptoError),

    /// I/O failure persisting the per-peer sequence barrier.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
