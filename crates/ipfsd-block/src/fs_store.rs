//! Durable, filesystem-backed block store.
//!
//! One file per block under `<root>/blocks/<base32(multihash)>`.
//! Concurrent-writer safety is achieved by writing to a temp file in
//! the same directory and renaming into place, which is atomic on a
//! shared filesystem, so no reader ever observes a half-written block.

use crate::block::Block;
use crate::cid::{self, Codec};
use crate::error::{BlockError, Result};
use crate::store::BlockStore;
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

/// A block store rooted at `<root>/blocks/`.
pub struct FsBlockStore {
    blocks_dir: PathBuf,
}

impl FsBlockStore {
    /// Open (creating if absent) a block store rooted at `<root>/blocks`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let blocks_dir = root.as_ref().join("blocks");
        fs::create_dir_all(&blocks_dir).await?;
        Ok(Self { blocks_dir })
    }

    fn path_for(&self, cid: &Cid) -> PathBuf {
        self.blocks_dir.join(cid::to_store_key(cid))
    }
}

#[async_trait]
impl BlockStore for FsBlockStore {
    #[instrument(skip(self, block), fields(cid = %block.cid, size = block.size()))]
    async fn put(&self, block: &Block) -> Result<()> {
        let path = self.path_for(&block.cid);
        if fs::try_exists(&path).await? {
            // Overwrite with identical bytes is a documented no-op; a
            // differing write still lands atomically via rename.
            return Ok(());
        }
        let tmp_path = self.blocks_dir.join(format!(".{}.tmp", cid::to_store_key(&block.cid)));
        let mut tmp = fs::File::create(&tmp_path).await?;
        tmp.write_all(&block.data).await?;
        tmp.flush().await?;
        fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn try_get(&self, cid: &Cid) -> Result<Option<Block>> {
        let path = self.path_for(cid);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(Block::trusted(*cid, Bytes::from(bytes)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BlockError::Io(e)),
        }
    }

    async fn length(&self, cid: &Cid) -> Result<Option<u64>> {
        let path = self.path_for(cid);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BlockError::Io(e)),
        }
    }

    async fn exists(&self, cid: &Cid) -> Result<bool> {
        Ok(fs::try_exists(self.path_for(cid)).await?)
    }

    async fn remove(&self, cid: &Cid) -> Result<bool> {
        match fs::remove_file(self.path_for(cid)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BlockError::Io(e)),
        }
    }

    /// Reconstructs a CID for each entry from its stored multihash,
    /// wrapped as CIDv1 `raw` — the store itself carries no codec
    /// metadata, so the codec on these returned CIDs is a convention,
    /// not a fact about the original write; callers that care about
    /// codec identity (GC, pin-set membership) compare by multihash via
    /// [`Cid::hash`], not by whole-CID equality.
    async fn names(&self) -> Result<Vec<Cid>> {
        let mut entries = fs::read_dir(&self.blocks_dir).await?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Ok(mh) = cid::store_key_to_multihash(name) {
                out.push(Cid::new_v1(Codec::Raw.code(), mh));
            }
        }
        Ok(out)
    }
}
