//! Archive (CAR) codec: a streaming container of (CID, bytes) entries.
//!
//! Byte layout: a varint-length-prefixed DAG-CBOR header
//! `{version, roots}` followed by a repeated `varint(len) cid-bytes
//! data-bytes` entry sequence. Varint framing decodes over an async
//! reader a byte at a time via `unsigned_varint::decode`, since the
//! node core's streams are all `tokio` async I/O.

use crate::block::Block;
use crate::cid::Codec;
use crate::error::{BlockError, Result};
use crate::pinset::PinSet;
use crate::store::BlockStore;
use crate::unixfs::UnixfsNode;
use bytes::Bytes;
use cid::Cid;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use std::collections::{HashSet, VecDeque};
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The DAG-CBOR header map every CARv1 stream begins with.
#[derive(Clone, Serialize, Deserialize)]
pub struct CarHeader {
    pub version: u64,
    pub roots: Vec<ByteBuf>,
}

/// The roots recovered from a completed [`import`].
pub struct ImportedArchive {
    pub roots: Vec<Cid>,
}

/// Export `roots` and their full reachable closure to `writer` as a
/// CARv1 stream. Traversal is breadth-first; each reached block is
/// emitted exactly once and unreachable blocks never appear.
pub async fn export<W: AsyncWrite + Unpin>(
    writer: &mut W,
    roots: &[Cid],
    store: &dyn BlockStore,
) -> Result<()> {
    let header = CarHeader {
        version: 1,
        roots: roots.iter().map(|c| ByteBuf::from(c.to_bytes())).collect(),
    };
    let header_bytes =
    serde_ipld_dagcbor::to_vec(&header).map_err(|e| BlockError::DagCborEncode(e.to_string()))?;
    write_varint(writer, header_bytes.len() as u64).await?;
    writer.write_all(&header_bytes).await?;

    let mut seen: HashSet<Vec<u8>> = HashSet::new();
    let mut queue: VecDeque<Cid> = VecDeque::new();
    for root in roots {
        if seen.insert(root.to_bytes()) {
            queue.push_back(*root);
        }
    }

    while let Some(cid) = queue.pop_front() {
        let block = store
        .try_get(&cid)
        .await?
        .ok_or(BlockError::NotFound(cid))?;
        let cid_bytes = cid.to_bytes();
        write_varint(writer, (cid_bytes.len() + block.data.len()) as u64).await?;
        writer.write_all(&cid_bytes).await?;
        writer.write_all(&block.data).await?;

        if cid.codec() == Codec::DagPb.code() {
            if let Ok(node) = UnixfsNode::decode(&block.data) {
                for link in node.links {
                    if seen.insert(link.cid.to_bytes()) {
                        queue.push_back(link.cid);
                    }
                }
            }
        }
    }
    writer.flush().await?;
    Ok(())
}

/// Import a CARv1 (or CARv2-wrapped-v1) stream from `reader`, storing
/// every entry into `store` after verifying its hash, and optionally
/// pinning the declared roots via `pin`.
pub async fn import<R: AsyncRead + Unpin>(
    reader: &mut R,
    store: &dyn BlockStore,
    pin: Option<(&PinSet, bool)>,
) -> Result<ImportedArchive> {
    let header = read_header(reader).await?;
    let roots = header
    .roots
    .iter()
    .map(|b| Cid::try_from(b.as_ref()).map_err(|e| BlockError::InvalidCid(e.to_string())))
    .collect::<Result<Vec<_>>>()?;

    loop {
        let Some(len) = read_varint(reader).await? else {
            break;
        };
        let mut buf = vec![0u8; len as usize];
        reader.read_exact(&mut buf).await?;
        let mut cursor = Cursor::new(&buf[..]);
        let cid = Cid::read_bytes(&mut cursor).map_err(|e| BlockError::InvalidCid(e.to_string()))?;
        let data_start = cursor.position() as usize;
        let data = Bytes::copy_from_slice(&buf[data_start..]);
        let block = Block::new(cid, data)?;
        store.put(&block).await?;
    }

    if let Some((pin_set, recursive)) = pin {
        for root in &roots {
            pin_set.add(*root, recursive, store).await?;
        }
    }

    Ok(ImportedArchive { roots })
}

/// Read the CARv1 header, transparently skipping a CARv2 pragma if
/// present: a version-2 header is followed by a fixed 40-byte
/// characteristics/offset block, after which the inner v1 header
/// follows in stream order.
async fn read_header<R: AsyncRead + Unpin>(reader: &mut R) -> Result<CarHeader> {
    loop {
        let len = read_varint(reader)
        .await?
        .ok_or_else(|| BlockError::MalformedArchive("empty archive stream".into()))?;
        let mut buf = vec![0u8; len as usize];
        reader.read_exact(&mut buf).await?;
        let header: CarHeader = serde_ipld_dagcbor::from_slice(&buf)
        .map_err(|e| BlockError::DagCborDecode(e.to_string()))?;
        match header.version {
            1 => return Ok(header),
            2 => {
                let mut v2_fields = [0u8; 40];
                reader.read_exact(&mut v2_fields).await?;
                continue;
            }
            other => return Err(BlockError::UnsupportedArchiveVersion(other)),
        }
    }
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<u64>> {
    let mut buf = Vec::with_capacity(10);
    loop {
        let mut byte = [0u8; 1];
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(BlockError::MalformedArchive("truncated varint".into()));
        }
        buf.push(byte[0]);
        match unsigned_varint::decode::u64(&buf) {
            Ok((value, _rest)) => return Ok(Some(value)),
            Err(unsigned_varint::decode::Error::Insufficient) => continue,
            Err(e) => return Err(BlockError::MalformedArchive(e.to_string())),
        }
    }
}

async fn write_varint<W: AsyncWrite + Unpin>(writer: &mut W, value: u64) -> Result<()> {
    let mut buf = unsigned_varint::encode::u64_buffer();
    let encoded = unsigned_varint::encode::u64(value, &mut buf);
    writer.write_all(encoded).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::DagLink;
    use crate::memory_store::MemoryBlockStore;
    use ipfsd_crypto::HashAlgorithm;

    #[tokio::test]
    async fn export_then_import_round_trips_a_single_block() {
        let store = MemoryBlockStore::new();
        let block = Block::encode(Codec::Raw, HashAlgorithm::Sha2_256, Bytes::from_static(b"hello")).unwrap();
        store.put(&block).await.unwrap();

        let mut bytes = Vec::new();
        export(&mut bytes, &[block.cid], &store).await.unwrap();

        let fresh_store = MemoryBlockStore::new();
        let mut cursor = Cursor::new(bytes);
        let imported = import(&mut cursor, &fresh_store, None).await.unwrap();
        assert_eq!(imported.roots, vec![block.cid]);
        assert_eq!(fresh_store.try_get(&block.cid).await.unwrap().unwrap().data, block.data);
    }

    #[tokio::test]
    async fn export_includes_only_reachable_blocks() {
        let store = MemoryBlockStore::new();
        let child = Block::encode(Codec::Raw, HashAlgorithm::Sha2_256, Bytes::from_static(b"child")).unwrap();
        let orphan = Block::encode(Codec::Raw, HashAlgorithm::Sha2_256, Bytes::from_static(b"orphan")).unwrap();
        store.put(&child).await.unwrap();
        store.put(&orphan).await.unwrap();
        let node = UnixfsNode::inner_file(vec![DagLink::new(None, child.cid, child.size() as u64)]);
        let root = Block::encode(Codec::DagPb, HashAlgorithm::Sha2_256, Bytes::from(node.encode())).unwrap();
        store.put(&root).await.unwrap();

        let mut bytes = Vec::new();
        export(&mut bytes, &[root.cid], &store).await.unwrap();

        let fresh_store = MemoryBlockStore::new();
        let mut cursor = Cursor::new(bytes);
        import(&mut cursor, &fresh_store, None).await.unwrap();
        assert!(fresh_store.exists(&root.cid).await.unwrap());
        assert!(fresh_store.exists(&child.cid).await.unwrap());
        assert!(!fresh_store.exists(&orphan.cid).await.unwrap());
    }

    #[tokio::test]
    async fn import_rejects_mis_hashed_entry() {
        let mut header_bytes = Vec::new();
        let header = CarHeader {
            version: 1,
            roots: vec![],
        };
        let encoded = serde_ipld_dagcbor::to_vec(&header).unwrap();
        write_varint(&mut header_bytes, encoded.len() as u64).await.unwrap();
        header_bytes.extend_from_slice(&encoded);

        let block = Block::encode(Codec::Raw, HashAlgorithm::Sha2_256, Bytes::from_static(b"hello")).unwrap();
        let cid_bytes = block.cid.to_bytes();
        let tampered_data = b"goodbye".to_vec();
        write_varint(&mut header_bytes, (cid_bytes.len() + tampered_data.len()) as u64)
        .await
        .unwrap();
        header_bytes.extend_from_slice(&cid_bytes);
        header_bytes.extend_from_slice(&tampered_data);

        let store = MemoryBlockStore::new();
        let mut cursor = Cursor::new(header_bytes);
        assert!(import(&mut cursor, &store, None).await.is_err());
    }
}
