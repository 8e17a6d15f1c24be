//! The Mutable Name Record: its wire format and the signing payload it
//! is built from.
//!
//! The wire struct is a hand-derived `prost::Message` impl, avoiding a
//! `build.rs` step, the same way `ipfsd-block::unixfs` and
//! `ipfsd-exchange::message` derive their `dag-pb`/bitswap wire structs.

use crate::error::{NamingError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use prost::Message;

/// The record's validity-type tag; only one variant is defined so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum ValidityType {
    EndOfLife = 0,
}

/// The 9-field wire shape.
#[derive(Clone, PartialEq, Message)]
pub struct IpnsEntry {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub value: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub signature: Option<Vec<u8>>,
    #[prost(enumeration = "ValidityType", optional, tag = "3")]
    pub validity_type: Option<i32>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub validity: Option<Vec<u8>>,
    #[prost(uint64, optional, tag = "5")]
    pub sequence: Option<u64>,
    #[prost(uint64, optional, tag = "6")]
    pub ttl: Option<u64>,
    #[prost(bytes = "vec", optional, tag = "7")]
    pub pub_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "8")]
    pub signature_v2: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "9")]
    pub data: Option<Vec<u8>>,
}

/// A parsed, validated name record: the domain-level shape the Name
/// Record Manager builds, signs, and admits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameRecord {
    pub value: String,
    pub signature: Vec<u8>,
    pub validity: DateTime<Utc>,
    pub sequence: u64,
    pub ttl_nanos: Option<u64>,
    pub public_key: Option<Vec<u8>>,
}

impl NameRecord {
    /// The bytes `publish` signs: `value || validity ||
    /// big-endian 8-byte validity-type`.
    pub fn signing_payload(value: &[u8], validity: &[u8], validity_type: ValidityType) -> Vec<u8> {
        let mut payload = Vec::with_capacity(value.len() + validity.len() + 8);
        payload.extend_from_slice(value);
        payload.extend_from_slice(validity);
        payload.extend_from_slice(&(validity_type as u64).to_be_bytes());
        payload
    }

    /// Format a validity timestamp as RFC3339 with nanosecond precision
    /// and a trailing `Z`.
    pub fn format_validity(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    /// Assemble a record from its already-computed `signature` (the
    /// caller signs [`NameRecord::signing_payload`] via an async
    /// `Keystore::compute_signature` call before reaching this
    /// constructor; see `manager::NameManager::publish`).
    pub fn new_signed(
        value: &str,
        sequence: u64,
        validity: DateTime<Utc>,
        signature: Vec<u8>,
        public_key: Option<Vec<u8>>,
    ) -> Self {
        Self {
            value: value.to_string(),
            signature,
            validity,
            sequence,
            ttl_nanos: None,
            public_key,
        }
    }

    /// Encode as the wire-format [`IpnsEntry`].
    pub fn to_wire(&self) -> IpnsEntry {
        IpnsEntry {
            value: Some(self.value.clone().into_bytes()),
            signature: Some(self.signature.clone()),
            validity_type: Some(ValidityType::EndOfLife as i32),
            validity: Some(Self::format_validity(self.validity).into_bytes()),
            sequence: Some(self.sequence),
            ttl: self.ttl_nanos,
            pub_key: self.public_key.clone(),
            signature_v2: None,
            data: None,
        }
    }

    /// Decode from the wire format, verifying the signature against
    /// `verifying_key` (the caller resolves this either from the
    /// record's own embedded `pub_key` field or from the publisher's
    /// peer id).
    pub fn from_wire(entry: IpnsEntry, verifying_key: &[u8]) -> Result<Self> {
        let value = entry.value.ok_or_else(|| NamingError::MalformedRecord("missing value".into()))?;
        let signature = entry
        .signature
        .ok_or_else(|| NamingError::MalformedRecord("missing signature".into()))?;
        let validity_bytes = entry
        .validity
        .ok_or_else(|| NamingError::MalformedRecord("missing validity".into()))?;
        let sequence = entry
        .sequence
        .ok_or_else(|| NamingError::MalformedRecord("missing sequence".into()))?;
        let validity_type = entry
        .validity_type
        .and_then(|t| ValidityType::try_from(t).ok())
        .unwrap_or(ValidityType::EndOfLife);

        let payload = Self::signing_payload(&value, &validity_bytes, validity_type);
        ipfsd_crypto::keystore::verify_signature(verifying_key, &payload, &signature)
        .map_err(|_| NamingError::SignatureInvalid)?;

        let validity_str = String::from_utf8(validity_bytes)
        .map_err(|e| NamingError::MalformedRecord(e.to_string()))?;
        let validity = DateTime::parse_from_rfc3339(&validity_str)
        .map_err(|e| NamingError::MalformedRecord(e.to_string()))?
        .with_timezone(&Utc);
        let value = String::from_utf8(value).map_err(|e| NamingError::MalformedRecord(e.to_string()))?;

        Ok(Self {
                value,
                signature,
                validity,
                sequence,
                ttl_nanos: entry.ttl,
                public_key: entry.pub_key,
            })
    }

    /// Whether `self` has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.validity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipfsd_crypto::keystore::{verify_signature, KeyType, Keystore, MemoryKeystore};

    #[tokio::test]
    async fn sign_then_verify_round_trips() {
        let ks = MemoryKeystore::new();
        let info = ks.create_key("self", KeyType::Ed25519).await.unwrap();
        let validity = Utc::now() + chrono::Duration::hours(24);

        let validity_bytes = NameRecord::format_validity(validity).into_bytes();
        let payload = NameRecord::signing_payload(b"/ipfs/Qm...", &validity_bytes, ValidityType::EndOfLife);
        let signature = ks.compute_signature("self", &payload).await.unwrap();
        let record = NameRecord::new_signed("/ipfs/Qm...", 1, validity, signature, Some(info.public_key.clone()));

        verify_signature(&info.public_key, &payload, &record.signature).unwrap();
    }

    #[test]
    fn wire_round_trip_preserves_fields() {
        let validity = Utc::now() + chrono::Duration::hours(1);
        let record = NameRecord {
            value: "/ipfs/abc".into(),
            signature: vec![1, 2, 3],
            validity,
            sequence: 5,
            ttl_nanos: Some(60_000_000_000),
            public_key: Some(vec![9, 9]),
        };
        let wire = record.to_wire();
        assert_eq!(wire.sequence, Some(5));
        assert_eq!(wire.value, Some(b"/ipfs/abc".to_vec()));
    }

    #[test]
    fn expiry_is_relative_to_now() {
        let past = Utc::now() - chrono::Duration::hours(1);
        let record = NameRecord {
            value: "/ipfs/x".into(),
            signature: vec![],
            validity: past,
            sequence: 1,
            ttl_nanos: None,
            public_key: None,
        };
        assert!(record.is_expired(Utc::now()));
    }
}
