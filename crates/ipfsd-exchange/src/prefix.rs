//! A payload block's CID prefix: version + codec + hash-algorithm code
//! + digest length, all as varints. The receiver pairs a
//! decoded prefix with the payload's raw bytes to recompute the
//! digest and reconstruct the full CID, instead of resending the
//! digest twice on the wire. Encoded with `unsigned-varint`, already
//! this crate's framing dependency for wantlist-adjacent wire shapes.

use crate::error::{ExchangeError, Result};
use cid::Cid;
use ipfsd_crypto::HashAlgorithm;

/// The four varint-encoded fields that precede a payload block's raw
/// bytes on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CidPrefix {
    pub version: u64,
    pub codec: u64,
    pub hash_alg_code: u64,
    pub digest_len: usize,
}

impl CidPrefix {
    /// Extract the prefix fields from a full CID.
    pub fn from_cid(cid: &Cid) -> Self {
        let version = match cid.version() {
            cid::Version::V0 => 0,
            cid::Version::V1 => 1,
        };
        Self {
            version,
            codec: cid.codec(),
            hash_alg_code: cid.hash().code(),
            digest_len: cid.hash().digest().len(),
        }
    }

    /// Varint-encode the four fields in order.
    pub fn to_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        for value in [
            self.version,
            self.codec,
            self.hash_alg_code,
            self.digest_len as u64,
        ] {
            let mut buf = unsigned_varint::encode::u64_buffer();
            out.extend_from_slice(unsigned_varint::encode::u64(value, &mut buf));
        }
        out
    }

    /// Parse a prefix back out of its varint encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (version, rest) = read_varint(bytes)?;
        let (codec, rest) = read_varint(rest)?;
        let (hash_alg_code, rest) = read_varint(rest)?;
        let (digest_len, _rest) = read_varint(rest)?;
        Ok(Self {
                version,
                codec,
                hash_alg_code,
                digest_len: digest_len as usize,
            })
    }

    /// Reconstruct the full CID this prefix describes, given the
    /// payload's raw bytes (the digest is recomputed, not resent).
    pub fn reconstruct(&self, data: &[u8]) -> Result<Cid> {
        let alg = HashAlgorithm::from_code(self.hash_alg_code)?;
        let digest = alg.digest(data);
        if digest.len() != self.digest_len {
            return Err(ExchangeError::InvalidCidPrefix(
                    "digest length does not match the declared prefix".into(),
                ));
        }
        let mh = multihash::Multihash::<64>::wrap(self.hash_alg_code, &digest)
        .map_err(|e| ExchangeError::InvalidCidPrefix(e.to_string()))?;
        if self.version == 0 {
            Cid::new_v0(mh).map_err(|e| ExchangeError::InvalidCidPrefix(e.to_string()))
        } else {
            Ok(Cid::new_v1(self.codec, mh))
        }
    }
}

fn read_varint(bytes: &[u8]) -> Result<(u64, &[u8])> {
    unsigned_varint::decode::u64(bytes)
    .map_err(|e| ExchangeError::InvalidCidPrefix(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipfsd_block::cid::{build_cid, Codec};

    #[test]
    fn prefix_round_trips_through_bytes() {
        let cid = build_cid(Codec::Raw, HashAlgorithm::Sha2_256, b"hello").unwrap();
        let prefix = CidPrefix::from_cid(&cid);
        let bytes = prefix.to_bytes();
        let decoded = CidPrefix::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, prefix);
    }

    #[test]
    fn reconstruct_recomputes_the_same_cid() {
        let cid = build_cid(Codec::Raw, HashAlgorithm::Sha2_256, b"hello world").unwrap();
        let prefix = CidPrefix::from_cid(&cid);
        let reconstructed = prefix.reconstruct(b"hello world").unwrap();
        assert_eq!(reconstructed, cid);
    }
}
