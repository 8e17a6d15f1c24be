//! Balanced and trickle DAG layout builders.
//!
//! Folds a flat leaf sequence (from [`crate::chunker`]) into a Merkle
//! tree of `dag-pb` UnixFS nodes per its determinism
//! contract: fixed branching factor of 174, canonical `dag-pb`
//! serialization, and a fixed link order (file nodes: input order).

use crate::block::{Block, DagLink};
use crate::chunker::Leaf;
use crate::cid::{CidVersion, Codec};
use crate::error::{BlockError, Result};
use crate::unixfs::UnixfsNode;
use bytes::Bytes;
use cid::Cid;
use ipfsd_crypto::HashAlgorithm;
use std::collections::VecDeque;

/// Default branching factor for both layouts.
pub const BRANCHING_FACTOR: usize = 174;
/// Maximum trickle-layout recursion depth.
pub const MAX_TRICKLE_DEPTH: usize = 5;

/// Which tree shape to build over the leaf sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    Balanced,
    Trickle,
}

/// The built tree: its root block, plus every block produced along the
/// way (leaves and inner nodes), in the order they should be persisted.
pub struct DagBuildResult {
    pub root: Block,
    pub blocks: Vec<Block>,
}

#[derive(Clone, Copy)]
struct LevelItem {
    cid: Cid,
    size: u64,
}

/// Fold `leaves` into a tree under `layout`, then optionally wrap the
/// result in a one-entry directory node named `wrap_name`. `cid_version`
/// selects the CID version inner/wrapper `dag-pb` nodes are built under
/// (spec §4.4's "CID version" option; only takes effect for
/// `sha2-256`, see [`CidVersion`]).
pub fn build_dag(
    leaves: Vec<Leaf>,
    layout: Layout,
    hash_alg: HashAlgorithm,
    cid_version: CidVersion,
    wrap_name: Option<&str>,
) -> Result<DagBuildResult> {
    if leaves.is_empty() {
        return Err(BlockError::MalformedDagNode("no leaves to build a DAG from".into()));
    }
    let mut result = match layout {
        Layout::Balanced => build_balanced(leaves, hash_alg, cid_version)?,
        Layout::Trickle => build_trickle(leaves, hash_alg, cid_version)?,
    };
    if let Some(name) = wrap_name {
        let link = DagLink::new(Some(name.to_string()), result.root.cid, result.root.size() as u64);
        let dir = UnixfsNode::directory(vec![link]);
        let wrapper = Block::encode_versioned(Codec::DagPb, hash_alg, cid_version, Bytes::from(dir.encode()))?;
        result.blocks.push(wrapper.clone());
        result.root = wrapper;
    }
    Ok(result)
}

fn build_balanced(leaves: Vec<Leaf>, hash_alg: HashAlgorithm, cid_version: CidVersion) -> Result<DagBuildResult> {
    let mut all_blocks: Vec<Block> = Vec::with_capacity(leaves.len());
    let mut level: Vec<LevelItem> = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        level.push(LevelItem {
                cid: leaf.block.cid,
                size: leaf.declared_size,
            });
        all_blocks.push(leaf.block);
    }

    // A singleton leaf IS the root: no wrapping inner node.
    if level.len() == 1 {
        let root = all_blocks[0].clone();
        return Ok(DagBuildResult {
                root,
                blocks: all_blocks,
            });
    }

    loop {
        let mut next_level = Vec::with_capacity(level.len().div_ceil(BRANCHING_FACTOR));
        for bundle in level.chunks(BRANCHING_FACTOR) {
            let links: Vec<DagLink> = bundle
            .iter()
            .map(|item| DagLink::new(None, item.cid, item.size))
            .collect();
            let node = UnixfsNode::inner_file(links);
            let block = Block::encode_versioned(Codec::DagPb, hash_alg, cid_version, Bytes::from(node.encode()))?;
            next_level.push(LevelItem {
                    cid: block.cid,
                    size: node.total_size(),
                });
            all_blocks.push(block);
        }
        if next_level.len() == 1 {
            let root_cid = next_level[0].cid;
            let root = all_blocks
            .iter()
            .rev()
            .find(|b| b.cid == root_cid)
            .expect("just-built root is always the most recent block with this CID")
            .clone();
            return Ok(DagBuildResult {
                    root,
                    blocks: all_blocks,
                });
        }
        level = next_level;
    }
}

fn build_trickle(leaves: Vec<Leaf>, hash_alg: HashAlgorithm, cid_version: CidVersion) -> Result<DagBuildResult> {
    if leaves.len() == 1 {
        let root = leaves.into_iter().next().unwrap().block;
        return Ok(DagBuildResult {
                root: root.clone(),
                blocks: vec![root],
            });
    }
    let mut queue: VecDeque<Leaf> = leaves.into();
    let mut all_blocks = Vec::new();
    let root_item = build_trickle_node(&mut queue, 1, hash_alg, cid_version, &mut all_blocks)?
    .expect("non-empty leaf queue always yields a node");
    let root = all_blocks
    .iter()
    .rev()
    .find(|b| b.cid == root_item.cid)
    .expect("just-built root is always the most recent block with this CID")
    .clone();
    Ok(DagBuildResult {
            root,
            blocks: all_blocks,
        })
}

/// Build one trickle node at `depth`, consuming leaves from the front
/// of `queue`. Children alternate between a primitive leaf and a
/// recursively built subtree of depth `depth + 1`,
/// stopping at [`MAX_TRICKLE_DEPTH`] or when `queue` is exhausted.
/// Returns `None` only when `queue` was already empty on entry.
fn build_trickle_node(
    queue: &mut VecDeque<Leaf>,
    depth: usize,
    hash_alg: HashAlgorithm,
    cid_version: CidVersion,
    all_blocks: &mut Vec<Block>,
) -> Result<Option<LevelItem>> {
    if queue.is_empty() {
        return Ok(None);
    }
    let mut children: Vec<LevelItem> = Vec::new();
    let mut want_leaf = true;
    while children.len() < BRANCHING_FACTOR && !queue.is_empty() {
        if want_leaf || depth + 1 > MAX_TRICKLE_DEPTH {
            let leaf = queue.pop_front().unwrap();
            children.push(LevelItem {
                    cid: leaf.block.cid,
                    size: leaf.declared_size,
                });
            all_blocks.push(leaf.block);
        } else {
            match build_trickle_node(queue, depth + 1, hash_alg, cid_version, all_blocks)? {
                Some(sub) => children.push(sub),
                None => break,
            }
        }
        want_leaf = !want_leaf;
    }

    if children.len() == 1 {
        return Ok(Some(children[0]));
    }

    let links: Vec<DagLink> = children
    .iter()
    .map(|item| DagLink::new(None, item.cid, item.size))
    .collect();
    let node = UnixfsNode::inner_file(links);
    let block = Block::encode_versioned(Codec::DagPb, hash_alg, cid_version, Bytes::from(node.encode()))?;
    let item = LevelItem {
        cid: block.cid,
        size: node.total_size(),
    };
    all_blocks.push(block);
    Ok(Some(item))
}
