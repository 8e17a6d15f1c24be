//! UnixFS: the `dag-pb`-encoded file/directory node format.
//!
//! The wire structs are hand-derived `prost::Message` impls on plain
//! Rust structs with no `build.rs`/`.proto` codegen step.
//! `PbNode`/`PbLink` mirror the standard `dag-pb` protobuf schema:
//! `Data` is field 1, `Links` is field 2, but canonical `dag-pb` puts
//! `Links` on the wire before `Data`. prost's derived `encode_raw`
//! emits fields in struct-declaration order, not tag order, so `links`
//! is declared first here even though its tag is 2 — that is what
//! makes the encoder's byte order match canonical `dag-pb`. The
//! embedded `UnixfsData` message mirrors the standard `unixfs.proto`.

use crate::block::DagLink;
use crate::error::{BlockError, Result};
use cid::Cid;
use prost::Message;

/// A raw `dag-pb` node: optional opaque data plus an ordered list of
/// links. This is the wire-level shape; [`UnixfsNode`] wraps it with
/// the UnixFS-specific `Data` payload interpretation.
#[derive(Clone, PartialEq, Message)]
pub struct PbNode {
    #[prost(message, repeated, tag = "2")]
    pub links: Vec<PbLink>,
    #[prost(bytes = "vec", optional, tag = "1")]
    pub data: Option<Vec<u8>>,
}

/// A single `dag-pb` link.
#[derive(Clone, PartialEq, Message)]
pub struct PbLink {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub hash: Option<Vec<u8>>,
    #[prost(string, optional, tag = "2")]
    pub name: Option<String>,
    #[prost(uint64, optional, tag = "3")]
    pub tsize: Option<u64>,
}

/// UnixFS node types (`unixfs.proto`'s `DataType` enum).
#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum UnixfsType {
    Raw = 0,
    Directory = 1,
    File = 2,
    Metadata = 3,
    Symlink = 4,
    HamtShard = 5,
}

/// The UnixFS `Data` message embedded in a `PbNode`'s `data` field.
#[derive(Clone, PartialEq, Message)]
pub struct UnixfsData {
    #[prost(enumeration = "UnixfsType", tag = "1")]
    pub r#type: i32,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub data: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "3")]
    pub filesize: Option<u64>,
    #[prost(uint64, repeated, tag = "4")]
    pub blocksizes: Vec<u64>,
}

/// A parsed UnixFS node: type, declared file size, per-child block
/// sizes, optional inline data, and outgoing links.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnixfsNode {
    pub kind: NodeKind,
    pub filesize: u64,
    pub blocksizes: Vec<u64>,
    pub inline_data: Option<Vec<u8>>,
    pub links: Vec<DagLink>,
}

/// The three node kinds "UnixFS Node" data model names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
    Raw,
}

impl UnixfsNode {
    /// A leaf file node carrying `inline_data` and no links.
    pub fn leaf(inline_data: Vec<u8>) -> Self {
        let filesize = inline_data.len() as u64;
        Self {
            kind: NodeKind::File,
            filesize,
            blocksizes: Vec::new(),
            inline_data: Some(inline_data),
            links: Vec::new(),
        }
    }

    /// An inner file node whose children are `links`, each carrying its
    /// own declared file-size in `blocksizes` (same order as `links`).
    pub fn inner_file(links: Vec<DagLink>) -> Self {
        let blocksizes: Vec<u64> = links.iter().map(|l| l.size).collect();
        let filesize = blocksizes.iter().sum();
        Self {
            kind: NodeKind::File,
            filesize,
            blocksizes,
            inline_data: None,
            links,
        }
    }

    /// A directory node with one link per named entry, sorted by name.
    pub fn directory(mut links: Vec<DagLink>) -> Self {
        links.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            kind: NodeKind::Directory,
            filesize: 0,
            blocksizes: Vec::new(),
            inline_data: None,
            links,
        }
    }

    /// Total subtree size: this node's own declared file-size plus, for
    /// inner nodes, the sum already folded into `filesize`.
    pub fn total_size(&self) -> u64 {
        self.filesize
    }

    /// Canonical `dag-pb` encoding of this node. Field and link order
    /// are exactly as constructed: file nodes preserve input order,
    /// directories are sorted by name.
    pub fn encode(&self) -> Vec<u8> {
        let unixfs_type = match self.kind {
            NodeKind::File => UnixfsType::File,
            NodeKind::Directory => UnixfsType::Directory,
            NodeKind::Raw => UnixfsType::Raw,
        };
        let data = UnixfsData {
            r#type: unixfs_type as i32,
            data: self.inline_data.clone(),
            filesize: if matches!(self.kind, NodeKind::File) {
                Some(self.filesize)
            } else {
                None
            },
            blocksizes: self.blocksizes.clone(),
        };
        let pb = PbNode {
            data: Some(data.encode_to_vec()),
            links: self
            .links
            .iter()
            .map(|link| PbLink {
                    hash: Some(link.cid.to_bytes()),
                    name: link.name.clone(),
                    tsize: Some(link.size),
                })
            .collect(),
        };
        pb.encode_to_vec()
    }

    /// Decode a canonical `dag-pb` byte string back into a node.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let pb = PbNode::decode(bytes).map_err(|e| BlockError::MalformedDagNode(e.to_string()))?;
        let data_bytes = pb
        .data
        .ok_or_else(|| BlockError::MalformedDagNode("missing UnixFS Data field".into()))?;
        let data = UnixfsData::decode(data_bytes.as_slice())
        .map_err(|e| BlockError::MalformedDagNode(e.to_string()))?;
        let kind = match UnixfsType::try_from(data.r#type)
        .map_err(|_| BlockError::MalformedDagNode("unknown UnixFS type".into()))?
        {
            UnixfsType::File => NodeKind::File,
            UnixfsType::Directory => NodeKind::Directory,
            UnixfsType::Raw => NodeKind::Raw,
            _ => return Err(BlockError::MalformedDagNode("unsupported UnixFS type".into())),
        };
        let mut links = Vec::with_capacity(pb.links.len());
        for link in pb.links {
            let hash = link
            .hash
            .ok_or_else(|| BlockError::MalformedDagNode("link missing hash".into()))?;
            let cid = Cid::try_from(hash).map_err(|e| BlockError::MalformedDagNode(e.to_string()))?;
            links.push(DagLink::new(link.name, cid, link.tsize.unwrap_or(0)));
        }
        Ok(Self {
                kind,
                filesize: data.filesize.unwrap_or(0),
                blocksizes: data.blocksizes,
                inline_data: data.data,
                links,
            })
    }
}
