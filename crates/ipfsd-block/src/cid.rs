//! CID construction and inspection.
//!
//! Wraps the `cid`/`multihash` crates with the multicodec table and
//! identity-inlining rules, supporting every hash algorithm
//! [`ipfsd_crypto::HashAlgorithm`] knows.

use crate::error::{BlockError, Result};
use cid::Cid;
use data_encoding::BASE32_NOPAD;
use ipfsd_crypto::HashAlgorithm;
use multihash::Multihash;

/// Default inline threshold: blocks whose bytes are this size or
/// smaller may be represented as an identity-hash CID instead of being
/// written to the store.
pub const DEFAULT_INLINE_LIMIT: usize = 64;

/// Hard ceiling on block size: blocks larger than this are
/// rejected unless the caller passes `allow_big`.
pub const MAX_BLOCK_SIZE: usize = 2 * 1024 * 1024;

/// A linked-data codec. This is a closed enumeration —
/// new codecs require a code change here, not open extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Raw bytes, no envelope.
    Raw,
    /// protobuf-encoded UnixFS node, the only codec whose links are
    /// interpreted for DAG traversal.
    DagPb,
    /// CBOR-encoded IPLD data.
    DagCbor,
    /// JSON-encoded IPLD data.
    DagJson,
    /// Encrypted leaf content (Cryptographic Message Syntax envelope).
    Cms,
}

impl Codec {
    pub const RAW_CODE: u64 = 0x55;
    pub const DAG_PB_CODE: u64 = 0x70;
    pub const DAG_CBOR_CODE: u64 = 0x71;
    pub const DAG_JSON_CODE: u64 = 0x0129;
    pub const CMS_CODE: u64 = 0x82;

    pub fn code(&self) -> u64 {
        match self {
            Codec::Raw => Self::RAW_CODE,
            Codec::DagPb => Self::DAG_PB_CODE,
            Codec::DagCbor => Self::DAG_CBOR_CODE,
            Codec::DagJson => Self::DAG_JSON_CODE,
            Codec::Cms => Self::CMS_CODE,
        }
    }

    pub fn from_code(code: u64) -> Result<Self> {
        match code {
            Self::RAW_CODE => Ok(Codec::Raw),
            Self::DAG_PB_CODE => Ok(Codec::DagPb),
            Self::DAG_CBOR_CODE => Ok(Codec::DagCbor),
            Self::DAG_JSON_CODE => Ok(Codec::DagJson),
            Self::CMS_CODE => Ok(Codec::Cms),
            other => Err(BlockError::UnknownCodec(other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::Raw => "raw",
            Codec::DagPb => "dag-pb",
            Codec::DagCbor => "dag-cbor",
            Codec::DagJson => "dag-json",
            Codec::Cms => "cms",
        }
    }
}

/// Build a CIDv1 over `data` using `codec` and `hash_alg`.
///
/// When `hash_alg` is [`HashAlgorithm::Identity`] the resulting CID
/// carries `data` inline in its multihash digest rather than hashing it
/// — the "identity CID" case.
pub fn build_cid(codec: Codec, hash_alg: HashAlgorithm, data: &[u8]) -> Result<Cid> {
    let digest = hash_alg.digest(data);
    let mh = Multihash::<64>::wrap(hash_alg.code(), &digest)
    .map_err(|e| BlockError::InvalidCid(e.to_string()))?;
    Ok(Cid::new_v1(codec.code(), mh))
}

/// Build the canonical CIDv0 for `data`: sha2-256, implicitly `dag-pb`.
/// CIDv0 omits the version/codec fields on the wire.
pub fn build_cid_v0(data: &[u8]) -> Result<Cid> {
    let digest = HashAlgorithm::Sha2_256.digest(data);
    let mh = Multihash::<64>::wrap(HashAlgorithm::Sha2_256.code(), &digest)
    .map_err(|e| BlockError::InvalidCid(e.to_string()))?;
    Cid::new_v0(mh).map_err(|e| BlockError::InvalidCid(e.to_string()))
}

/// The CID version the chunker/DAG builder targets (spec §4.4's "CID
/// version" option).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CidVersion {
    V0,
    V1,
}

/// Build a CID under the requested version. `V0` is only representable
/// for `dag-pb` content hashed with `sha2-256` (CIDv0's implied codec
/// and algorithm); any other codec/algorithm combination falls back to
/// `V1`, matching how a default-configured build stays on CIDv0 for its
/// `dag-pb` leaves and inner nodes while `raw-leaves`/non-default hash
/// algorithms move to `V1`.
pub fn build_cid_versioned(version: CidVersion, codec: Codec, hash_alg: HashAlgorithm, data: &[u8]) -> Result<Cid> {
    match version {
        CidVersion::V0 if codec == Codec::DagPb && hash_alg == HashAlgorithm::Sha2_256 => build_cid_v0(data),
        _ => build_cid(codec, hash_alg, data),
    }
}

/// Whether this CID carries its content inline (identity multihash).
pub fn is_identity(cid: &Cid) -> bool {
    cid.hash().code() == HashAlgorithm::Identity.code()
}

/// Extract the inline bytes from an identity CID. Callers must check
/// [`is_identity`] first; this returns the multihash digest verbatim.
pub fn inline_bytes(cid: &Cid) -> &[u8] {
    cid.hash().digest()
}

/// Verify that `data` hashes to `cid`'s declared digest under its own
/// multihash algorithm. Used by the block store and archive importer to
/// reject mis-hashed bytes rather than store them.
pub fn verify(cid: &Cid, data: &[u8]) -> Result<()> {
    let alg = HashAlgorithm::from_code(cid.hash().code())?;
    if alg.verify(data, cid.hash().digest()) {
        Ok(())
    } else {
        Err(BlockError::HashMismatch {
                expected: data_encoding::HEXLOWER.encode(cid.hash().digest()),
                actual: data_encoding::HEXLOWER.encode(&alg.digest(data)),
            })
    }
}

/// Encode a CID's multihash as lowercase, unpadded base32 — a
/// filesystem-safe on-disk key format.
pub fn to_store_key(cid: &Cid) -> String {
    BASE32_NOPAD
    .encode(&cid.hash().to_bytes())
    .to_ascii_lowercase()
}

/// Parse a store key produced by [`to_store_key`] back into a multihash,
/// which callers pair with a codec recovered from directory metadata or
/// context — the store itself carries no codec information, only bytes.
pub fn store_key_to_multihash(key: &str) -> Result<Multihash<64>> {
    let bytes = BASE32_NOPAD
    .decode(key.to_ascii_uppercase().as_bytes())
    .map_err(|e| BlockError::InvalidCid(e.to_string()))?;
    Multihash::from_bytes(&bytes).map_err(|e| BlockError::InvalidCid(e.to_string()))
}
