//! Error types for the ipfsd-exchange crate

use thiserror::Error;

/// Result type alias using [`ExchangeError`]
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Errors the exchange engine surfaces to its caller. Network and
/// protocol errors from peers never reach here — only a caller's own
/// cancellation or a local decode failure does.
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// The caller's `get` was cancelled before a block arrived.
    #[error("want cancelled")]
    Cancelled,

    /// A message failed to decode off the wire.
    #[error("wire decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A payload block's CID prefix or its reconstructed CID was malformed.
    #[error("invalid CID prefix: {0}")]
    InvalidCidPrefix(String),

    /// None of the peer's supported protocol versions matched ours.
    #[error("no common bitswap protocol version with peer {0}")]
    NoCommonProtocol(String),

    /// Underlying block-store failure while servicing a want or
    /// persisting a received block.
    #[error("block store error: {0}")]
    Block(#[from] ipfsd_block::BlockError),

    /// I/O failure on a peer stream.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}
