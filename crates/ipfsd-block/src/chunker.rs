//! Fixed-size chunking of a byte stream into DAG leaves.
//!
//! A reader-loop chunker emitting typed leaves (raw, cms, or
//! dag-pb-wrapped) at a fixed chunk size.

use crate::block::Block;
use crate::cid::{CidVersion, Codec};
use crate::error::{BlockError, Result};
use crate::unixfs::UnixfsNode;
use bytes::Bytes;
use ipfsd_crypto::symmetric::{self, ProtectionKey};
use ipfsd_crypto::HashAlgorithm;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default chunk size: 256 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Parse a chunker size token of the form `size-262144` into a byte
/// count (mirrors go-ipfs's `--chunker` flag spelling).
pub fn parse_chunk_size_token(token: &str) -> Result<usize> {
    let digits = token
    .strip_prefix("size-")
    .ok_or_else(|| BlockError::MalformedDagNode(format!("unrecognized chunker token: {token}")))?;
    digits
    .parse::<usize>()
    .map_err(|_| BlockError::MalformedDagNode(format!("unrecognized chunker token: {token}")))
}

/// How a chunk's bytes become a leaf block.
#[derive(Clone)]
pub enum LeafMode {
    /// Raw bytes, codec `raw`.
    Raw,
    /// Encrypted under `key`, codec `cms`.
    Protected(ProtectionKey),
    /// Inline data wrapped in a `dag-pb` UnixFS file node.
    UnixfsInline,
}

/// Chunking options, minus layout/wrap which the DAG builder consumes.
#[derive(Clone)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub hash_alg: HashAlgorithm,
    pub leaf_mode: LeafMode,
    /// CID version `dag-pb` leaves (and, via [`crate::dag`], inner
    /// nodes) are built under. Only affects `dag-pb`/`sha2-256`
    /// content — see [`CidVersion`].
    pub cid_version: CidVersion,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            hash_alg: HashAlgorithm::DEFAULT,
            leaf_mode: LeafMode::UnixfsInline,
            cid_version: CidVersion::V0,
        }
    }
}

/// A leaf block plus its declared size, the unit the DAG builder
/// bundles into inner nodes.
#[derive(Clone)]
pub struct Leaf {
    pub block: Block,
    pub declared_size: u64,
}

/// Split `reader` into fixed-size leaves under `config`. An empty
/// stream still yields exactly one (empty) leaf.
pub async fn chunk_reader<R: AsyncRead + Unpin>(
    reader: &mut R,
    config: &ChunkerConfig,
) -> Result<Vec<Leaf>> {
    let mut leaves = Vec::new();
    let mut buf = vec![0u8; config.chunk_size];
    loop {
        let n = read_up_to(reader, &mut buf).await?;
        if n == 0 && !leaves.is_empty() {
            break;
        }
        let chunk = &buf[..n];
        leaves.push(make_leaf(chunk, config)?);
        if n < config.chunk_size {
            break;
        }
    }
    Ok(leaves)
}

/// Split an in-memory byte slice into leaves. Convenience wrapper over
/// [`chunk_reader`] for callers that already hold the full payload.
pub async fn chunk_bytes(data: &[u8], config: &ChunkerConfig) -> Result<Vec<Leaf>> {
    let mut cursor = std::io::Cursor::new(data);
    chunk_reader(&mut cursor, config).await
}

async fn read_up_to<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn make_leaf(chunk: &[u8], config: &ChunkerConfig) -> Result<Leaf> {
    let declared_size = chunk.len() as u64;
    let block = match &config.leaf_mode {
        LeafMode::Raw => Block::encode(Codec::Raw, config.hash_alg, Bytes::copy_from_slice(chunk))?,
        LeafMode::Protected(key) => {
            let sealed = symmetric::encrypt(key, chunk)?;
            Block::encode(Codec::Cms, config.hash_alg, Bytes::from(sealed))?
        }
        LeafMode::UnixfsInline => {
            let node = UnixfsNode::leaf(chunk.to_vec());
            Block::encode_versioned(Codec::DagPb, config.hash_alg, config.cid_version, Bytes::from(node.encode()))?
        }
    };
    Ok(Leaf {
            block,
            declared_size,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_token() {
        assert_eq!(parse_chunk_size_token("size-3").unwrap(), 3);
        assert_eq!(parse_chunk_size_token("size-262144").unwrap(), DEFAULT_CHUNK_SIZE);
        assert!(parse_chunk_size_token("rabin").is_err());
    }

    #[tokio::test]
    async fn empty_input_yields_one_leaf() {
        let leaves = chunk_bytes(b"", &ChunkerConfig::default()).await.unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].declared_size, 0);
    }

    #[tokio::test]
    async fn exact_multiple_of_chunk_size_does_not_append_empty_leaf() {
        let config = ChunkerConfig {
            chunk_size: 3,
            ..Default::default()
        };
        let leaves = chunk_bytes(b"abcdef", &config).await.unwrap();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].declared_size, 3);
        assert_eq!(leaves[1].declared_size, 3);
    }

    #[tokio::test]
    async fn four_chunks_of_three_bytes() {
        let config = ChunkerConfig {
            chunk_size: 3,
            ..Default::default()
        };
        let leaves = chunk_bytes(b"hello world", &config).await.unwrap();
        assert_eq!(leaves.len(), 4);
        assert_eq!(leaves[3].declared_size, 2);
    }

    #[tokio::test]
    async fn chunking_is_deterministic() {
        let config = ChunkerConfig::default();
        let a = chunk_bytes(b"hello world", &config).await.unwrap();
        let b = chunk_bytes(b"hello world", &config).await.unwrap();
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].block.cid, b[0].block.cid);
    }

    #[tokio::test]
    async fn default_leaf_mode_is_unixfs_inline_dag_pb() {
        // Spec §4.4: absent `raw-leaves`/a protection key, the default
        // leaf is a `dag-pb` UnixFS file node with inline data, not raw
        // bytes. Matches spec §8 scenario 1's reference root CID.
        let leaves = chunk_bytes(b"hello world", &ChunkerConfig::default()).await.unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].block.cid.codec(), Codec::DagPb.code());
        assert_eq!(
            leaves[0].block.cid.to_string(),
            "Qmf412jQZiuVUtdgnB36FXFX7xg5V6KEbSJ4dpQuhkLyfD"
        );
    }

    #[tokio::test]
    async fn protected_leaves_use_cms_codec() {
        let key = ProtectionKey::generate();
        let config = ChunkerConfig {
            leaf_mode: LeafMode::Protected(key),
            ..Default::default()
        };
        let leaves = chunk_bytes(b"secret", &config).await.unwrap();
        assert_eq!(leaves[0].block.cid.codec(), Codec::Cms.code());
    }
}
