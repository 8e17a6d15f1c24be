//! Core block and DAG-link types.
//!
//! `Block` holds raw bytes only; codec interpretation is the caller's
//! job, not the type's.

use crate::cid::{self, Codec};
use crate::error::Result;
use bytes::Bytes;
use cid::Cid;
use serde::{Deserialize, Serialize};

/// A content-addressed block: a CID paired with the bytes it names.
/// The invariant `hash(data) == cid.digest` holds for every `Block`
/// constructed via [`Block::new`]; callers that already trust the
/// pairing (e.g. reading back from the store) use [`Block::trusted`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub cid: Cid,
    pub data: Bytes,
}

impl Block {
    /// Construct a block, computing and verifying its CID's digest
    /// against `data`.
    pub fn new(cid: Cid, data: Bytes) -> Result<Self> {
        if !cid::is_identity(&cid) {
            cid::verify(&cid, &data)?;
        }
        Ok(Self { cid, data })
    }

    /// Construct a block from bytes already known to hash to `cid`,
    /// skipping verification. Used when reading a block back from a
    /// store that has already verified it once on write.
    pub fn trusted(cid: Cid, data: Bytes) -> Self {
        Self { cid, data }
    }

    /// Build a block from scratch under the given codec and hash
    /// algorithm.
    pub fn encode(codec: Codec, hash_alg: ipfsd_crypto::HashAlgorithm, data: Bytes) -> Result<Self> {
        let cid = cid::build_cid(codec, hash_alg, &data)?;
        Ok(Self { cid, data })
    }

    /// Build a block under the requested [`cid::CidVersion`] rather than
    /// always `V1` — the chunker/DAG builder's entry point for honoring
    /// spec §4.4's "CID version" option.
    pub fn encode_versioned(
        codec: Codec,
        hash_alg: ipfsd_crypto::HashAlgorithm,
        version: cid::CidVersion,
        data: Bytes,
    ) -> Result<Self> {
        let cid = cid::build_cid_versioned(version, codec, hash_alg, &data)?;
        Ok(Self { cid, data })
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A lightweight reference to a block's identity and size, without the
/// full byte payload. Returned by `stat`-style operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    #[serde(with = "cid_serde")]
    pub cid: Cid,
    pub size: u64,
}

impl BlockRef {
    pub fn new(cid: Cid, size: u64) -> Self {
        Self { cid, size }
    }
}

impl From<&Block> for BlockRef {
    fn from(block: &Block) -> Self {
        Self {
            cid: block.cid,
            size: block.data.len() as u64,
        }
    }
}

/// A single outgoing DAG edge: the child's CID, an optional name (used
/// by directory nodes), and the cumulative byte size of the child's
/// subtree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagLink {
    pub name: Option<String>,
    #[serde(with = "cid_serde")]
    pub cid: Cid,
    pub size: u64,
}

impl DagLink {
    pub fn new(name: Option<String>, cid: Cid, size: u64) -> Self {
        Self { name, cid, size }
    }
}

/// Serde helper for serializing a [`Cid`] as its string form, since
/// `cid::Cid` only implements `Serialize`/`Deserialize` via the `serde`
/// feature's byte representation, and callers of these types want the
/// human-readable form in on-disk JSON (e.g. pin records, config).
mod cid_serde {
    use cid::Cid;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(cid: &Cid, serializer: S) -> Result<S::Ok, S::Error> {
        cid.to_string().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cid, D::Error> {
        let s = String::deserialize(deserializer)?;
        Cid::from_str(&s).map_err(serde::de::Error::custom)
    }
}
