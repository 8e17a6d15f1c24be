//! Content-addressed storage primitives for the ipfsd node core.
//!
//! - [`cid`] builds and inspects CIDs (multi-algorithm, identity-inlining).
//! - [`block`] / [`store`] / [`fs_store`] / [`memory_store`] are the
//! block and block-store types.
//! - [`pinset`] is the durable GC-protection set.
//! - [`chunker`] / [`unixfs`] / [`dag`] turn a byte stream into a UnixFS
//! Merkle DAG.
//! - [`car`] is the archive (CAR) import/export codec.

pub mod block;
pub mod car;
pub mod chunker;
pub mod cid;
pub mod dag;
pub mod error;
pub mod fs_store;
pub mod memory_store;
pub mod pinset;
pub mod store;
pub mod unixfs;

pub use block::{Block, BlockRef, DagLink};
pub use error::{BlockError, Result};
pub use store::BlockStore;
