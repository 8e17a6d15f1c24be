//! Bitswap-family wire messages.
//!
//! Hand-derived `prost::Message` structs on plain Rust types, with no
//! `build.rs`/`.proto` codegen pipeline. Field layout covers wantlist
//! entries, payload blocks, block presences, and pending bytes.

use prost::Message;

/// The top-level exchange message. A single message may carry a
/// wantlist update, payload blocks, and presence entries together.
#[derive(Clone, PartialEq, Message)]
pub struct ExchangeMessage {
    #[prost(message, optional, tag = "1")]
    pub wantlist: Option<Wantlist>,
    /// Deprecated raw-block field kept only for wire compatibility with
    /// bitswap 1.0.0 peers; the node core never populates it itself.
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub blocks: Vec<Vec<u8>>,
    #[prost(message, repeated, tag = "3")]
    pub payload: Vec<PayloadBlock>,
    #[prost(message, repeated, tag = "4")]
    pub block_presences: Vec<BlockPresence>,
    #[prost(int32, optional, tag = "5")]
    pub pending_bytes: Option<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Wantlist {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<Entry>,
    #[prost(bool, optional, tag = "2")]
    pub full: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Entry {
    /// The wanted block's CID bytes.
    #[prost(bytes = "vec", optional, tag = "1")]
    pub block: Option<Vec<u8>>,
    #[prost(int32, optional, tag = "2")]
    pub priority: Option<i32>,
    #[prost(bool, optional, tag = "3")]
    pub cancel: Option<bool>,
    #[prost(enumeration = "WantType", optional, tag = "4")]
    pub want_type: Option<i32>,
    #[prost(bool, optional, tag = "5")]
    pub send_dont_have: Option<bool>,
}

/// Per-entry want kind, added in bitswap 1.2.0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum WantType {
    Block = 0,
    Have = 1,
}

/// A CID/bytes pair delivered in a message's `payload` field. `prefix`
/// carries the CID's version, codec, hash-algorithm code, and digest
/// length, all as varints, so the receiver can reconstruct
/// the CID without resending the full multihash digest twice.
#[derive(Clone, PartialEq, Message)]
pub struct PayloadBlock {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub prefix: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub data: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct BlockPresence {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub cid: Option<Vec<u8>>,
    #[prost(enumeration = "BlockPresenceType", optional, tag = "2")]
    pub presence_type: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum BlockPresenceType {
    Have = 0,
    DontHave = 1,
}
