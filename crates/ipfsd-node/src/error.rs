//! `NodeError`: the user-visible error type for the node core, composed
//! via `#[from]` up the dependency graph from each lower crate's own
//! error enum.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors surfaced to callers of the Block Layer, Engine Core, and
/// Repository Migrator. Protocol/replay errors are handled inside the
/// exchange and naming crates and never propagate this far.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found")]
    NotFound,

    #[error("operation cancelled")]
    Cancelled,

    #[error("corrupt repository: {0}")]
    CorruptRepository(String),

    #[error("repository already at a version with no known migration: {0}")]
    Conflict(String),

    #[error("block error: {0}")]
    Block(#[from] ipfsd_block::BlockError),

    #[error("exchange error: {0}")]
    Exchange(#[from] ipfsd_exchange::ExchangeError),

    #[error("naming error: {0}")]
    Naming(#[from] ipfsd_naming::NamingError),

    #[error("crypto error: {0}")]
    Crypto(#[from] ipfsd_crypto::CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}
