//! The `BlockStore` trait: durable key→bytes mapping by content hash.
//!
//! Narrowed to the five byte-oriented operations (`put`/`try_get`/
//! `length`/`exists`/`remove`) plus the `names()` iterator; IPLD-typed
//! convenience methods stay out of this trait since CID/codec selection
//! belongs to the block layer, not the store.

use crate::block::Block;
use crate::error::Result;
use async_trait::async_trait;
use cid::Cid;

/// A durable mapping from CID to block bytes.
///
/// Implementations must support concurrent readers, and concurrent
/// writers racing on the same CID must leave either a complete file or
/// no file — never a torn write.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store `block`. Idempotent: writing identical bytes under a CID
    /// already present is a no-op.
    async fn put(&self, block: &Block) -> Result<()>;

    /// Fetch a block's bytes, or `None` if absent. Does not consult the
    /// network — that is the block layer's job.
    async fn try_get(&self, cid: &Cid) -> Result<Option<Block>>;

    /// Byte length of a stored block, or `None` if absent.
    async fn length(&self, cid: &Cid) -> Result<Option<u64>>;

    /// Whether a block is present.
    async fn exists(&self, cid: &Cid) -> Result<bool>;

    /// Remove a block. Returns whether anything was removed.
    async fn remove(&self, cid: &Cid) -> Result<bool>;

    /// Iterate over every CID currently stored. Used by garbage
    /// collection and by export.
    async fn names(&self) -> Result<Vec<Cid>>;
}
