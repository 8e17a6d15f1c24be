//! Pin Set: a durable set of (CID, kind) shielding roots from GC.
//!
//! Keyed the same way the Block Store is keyed — base32 multihash, one
//! file per pin under `<root>/pins/`. The pin record is written before
//! the target's transitive closure is fetched, so a crash mid-fetch
//! still protects the target from a future GC.

use crate::block::Block;
use crate::cid::{self, Codec};
use crate::error::{BlockError, Result};
use crate::store::BlockStore;
use crate::unixfs::UnixfsNode;
use cid::Cid;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Whether a pin protects only its own block, or its entire DAG
/// closure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinKind {
    Direct,
    Recursive,
}

impl PinKind {
    fn to_byte(self) -> u8 {
        match self {
            PinKind::Direct => 0,
            PinKind::Recursive => 1,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(PinKind::Direct),
            1 => Ok(PinKind::Recursive),
            other => Err(BlockError::MalformedArchive(format!("invalid pin kind byte: {other}"))),
        }
    }
}

/// A single pin entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinEntry {
    pub cid: Cid,
    pub kind: PinKind,
}

/// Report produced by [`PinSet::gc`].
#[derive(Debug, Default)]
pub struct GcReport {
    pub removed: Vec<Cid>,
    pub retained: usize,
}

/// A durable pin set rooted at `<root>/pins/`.
pub struct PinSet {
    pins_dir: PathBuf,
}

impl PinSet {
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let pins_dir = root.as_ref().join("pins");
        fs::create_dir_all(&pins_dir).await?;
        Ok(Self { pins_dir })
    }

    fn path_for(&self, cid: &Cid) -> PathBuf {
        self.pins_dir.join(cid::to_store_key(cid))
    }

    async fn write_pin(&self, cid: &Cid, kind: PinKind) -> Result<()> {
        let path = self.path_for(cid);
        let tmp_path = self.pins_dir.join(format!(".{}.tmp", cid::to_store_key(cid)));
        let mut tmp = fs::File::create(&tmp_path).await?;
        tmp.write_all(&[kind.to_byte()]).await?;
        tmp.flush().await?;
        fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    /// Pin `root` and, if `recursive`, its entire DAG closure. The pin
    /// record for each CID is persisted *before* that CID's block is
    /// fetched, so an interrupted recursive pin still protects every
    /// CID already queued from GC.
    pub async fn add(&self, root: Cid, recursive: bool, store: &dyn BlockStore) -> Result<()> {
        let kind = if recursive { PinKind::Recursive } else { PinKind::Direct };
        let mut stack = vec![root];
        while let Some(cid) = stack.pop() {
            self.write_pin(&cid, kind).await?;
            let block = fetch_or_error(store, &cid).await?;
            if recursive && cid.codec() == Codec::DagPb.code() {
                if let Ok(node) = UnixfsNode::decode(&block.data) {
                    for link in node.links {
                        stack.push(link.cid);
                    }
                }
            }
        }
        Ok(())
    }

    /// Mirror of [`PinSet::add`]: unpin `cid` and, if `recursive`, every
    /// CID in its DAG closure that is reachable via stored blocks.
    pub async fn remove(&self, cid: Cid, recursive: bool, store: &dyn BlockStore) -> Result<()> {
        let mut stack = vec![cid];
        while let Some(cid) = stack.pop() {
            let path = self.path_for(&cid);
            let _ = fs::remove_file(&path).await;
            if recursive && cid.codec() == Codec::DagPb.code() {
                if let Some(block) = store.try_get(&cid).await? {
                    if let Ok(node) = UnixfsNode::decode(&block.data) {
                        for link in node.links {
                            stack.push(link.cid);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn is_pinned(&self, cid: &Cid) -> Result<bool> {
        Ok(fs::try_exists(self.path_for(cid)).await?)
    }

    /// List every pin, optionally filtered to one kind.
    pub async fn list(&self, kind: Option<PinKind>) -> Result<Vec<PinEntry>> {
        let mut entries = fs::read_dir(&self.pins_dir).await?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            let Ok(mh) = cid::store_key_to_multihash(name) else { continue };
            let bytes = fs::read(entry.path()).await?;
            let Some(&byte) = bytes.first() else { continue };
            let entry_kind = PinKind::from_byte(byte)?;
            if kind.is_some_and(|k| k != entry_kind) {
                continue;
            }
            out.push(PinEntry {
                    cid: Cid::new_v1(Codec::Raw.code(), mh),
                    kind: entry_kind,
                });
        }
        Ok(out)
    }

    /// Remove every block from `store` that is not reachable from a pin
    /// (transitive closure for recursive pins). Matches blocks to pins
    /// by multihash, since neither the store nor the pin set preserves
    /// codec identity.
    pub async fn gc(&self, store: &dyn BlockStore) -> Result<GcReport> {
        let pins = self.list(None).await?;
        let mut protected: HashSet<Vec<u8>> = HashSet::new();
        let mut stack = Vec::new();
        for pin in &pins {
            protected.insert(pin.cid.hash().to_bytes());
            if pin.kind == PinKind::Recursive {
                stack.push(pin.cid);
            }
        }
        while let Some(cid) = stack.pop() {
            if let Some(block) = store.try_get(&cid).await? {
                if let Ok(node) = UnixfsNode::decode(&block.data) {
                    for link in node.links {
                        if protected.insert(link.cid.hash().to_bytes()) {
                            stack.push(link.cid);
                        }
                    }
                }
            }
        }

        let mut report = GcReport::default();
        for cid in store.names().await? {
            if protected.contains(&cid.hash().to_bytes()) {
                report.retained += 1;
            } else {
                store.remove(&cid).await?;
                report.removed.push(cid);
            }
        }
        Ok(report)
    }
}

async fn fetch_or_error(store: &dyn BlockStore, cid: &Cid) -> Result<Block> {
    store
    .try_get(cid)
    .await?
    .ok_or(BlockError::NotFound(*cid))
}
