//! `ipfsd`: thin root aggregator re-exporting the workspace's member
//! crates behind one name.
//!
//! The node binary itself lives in `ipfsd-node`; this crate exists so
//! the workspace root is a buildable, documentable entry point rather
//! than a bare manifest.

pub use ipfsd_block as block;
pub use ipfsd_crypto as crypto;
pub use ipfsd_node as node;
