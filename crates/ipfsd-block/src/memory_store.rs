//! In-memory block store.
//!
//! A `DashMap` keyed by CID, safe for concurrent readers and writers
//! without an explicit lock.

use crate::block::Block;
use crate::error::Result;
use crate::store::BlockStore;
use async_trait::async_trait;
use cid::Cid;
use dashmap::DashMap;
use std::sync::Arc;

/// A `DashMap`-backed store. Useful for tests and for any collaborator
/// (e.g. a pin-set GC dry run) that wants a throwaway store.
#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: Arc<DashMap<Cid, Block>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self {
            blocks: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn put(&self, block: &Block) -> Result<()> {
        self.blocks.insert(block.cid, block.clone());
        Ok(())
    }

    async fn try_get(&self, cid: &Cid) -> Result<Option<Block>> {
        Ok(self.blocks.get(cid).map(|entry| entry.value().clone()))
    }

    async fn length(&self, cid: &Cid) -> Result<Option<u64>> {
        Ok(self.blocks.get(cid).map(|entry| entry.value().size() as u64))
    }

    async fn exists(&self, cid: &Cid) -> Result<bool> {
        Ok(self.blocks.contains_key(cid))
    }

    async fn remove(&self, cid: &Cid) -> Result<bool> {
        Ok(self.blocks.remove(cid).is_some())
    }

    async fn names(&self) -> Result<Vec<Cid>> {
        Ok(self.blocks.iter().map(|entry| *entry.key()).collect())
    }
}
