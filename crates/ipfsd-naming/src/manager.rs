//! The Name Record Manager: `publish`, `resolve`, and the replay-barrier
//! `admit`.
//!
//! Uses the same `new(...) -> Arc<Self>` / `self: &Arc<Self>` shape as
//! the exchange engine: resolving a name lazily subscribes to its
//! pub/sub topic, and the subscription handler needs a live handle back
//! into the manager to admit records that arrive asynchronously.

use crate::error::{NamingError, Result};
use crate::record::{NameRecord, ValidityType};
use crate::routing::{PubSub, PubSubHandler, RoutingFacade};
use data_encoding::BASE32_NOPAD;
use dashmap::DashMap;
use ipfsd_crypto::Keystore;
use prost::Message;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use chrono::Utc;

/// How many `/ipns/...` hops [`NameManager::resolve`] will chase with
/// `recursive = true` before giving up.
const MAX_RESOLVE_DEPTH: u32 = 32;

/// The result of a successful [`NameManager::publish`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedName {
    pub name: String,
    pub path: String,
}

/// An external collaborator resolving DNSLink TXT records, consulted
/// when `resolve`'s first path component contains a dot.
#[async_trait::async_trait]
pub trait DnsLinkResolver: Send + Sync {
    async fn resolve(&self, domain: &str) -> Result<String>;
}

/// Derive a peer id from a public key. Real IPFS peer ids are the
/// multihash of a key's protobuf encoding, base58btc-encoded; this
/// workspace has no base58 dependency, so we use the same base32
/// convention `ipfsd_block::cid::to_store_key` already uses for
/// multihash store keys, applied directly to the raw public key bytes.
/// The encoding is invertible, which `resolve` relies on to recover a
/// verifying key from a bare name when no key is embedded in the
/// record.
pub fn peer_id_from_public_key(public_key: &[u8]) -> String {
    BASE32_NOPAD.encode(public_key).to_ascii_lowercase()
}

fn public_key_from_peer_id(peer_id: &str) -> Result<Vec<u8>> {
    BASE32_NOPAD
    .decode(peer_id.to_ascii_uppercase().as_bytes())
    .map_err(|e| NamingError::MalformedRecord(e.to_string()))
}

/// The derived pub/sub topic for a peer's name records:
/// `/record/` + base64url(`/ipns/<peerId>`).
fn topic_for_peer(peer_id: &str) -> String {
    use base64::Engine;
    let key = format!("/ipns/{peer_id}");
    format!("/record/{}", base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(key))
}

pub struct NameManager {
    keystore: Arc<dyn Keystore>,
    routing: Arc<RoutingFacade>,
    pubsub: Arc<dyn PubSub>,
    dns: Option<Arc<dyn DnsLinkResolver>>,
    seq_dir: PathBuf,
    max_seen: DashMap<String, u64>,
    cache: DashMap<String, NameRecord>,
    subscribed: DashMap<String, ()>,
}

impl NameManager {
    pub fn new(
        keystore: Arc<dyn Keystore>,
        routing: Arc<RoutingFacade>,
        pubsub: Arc<dyn PubSub>,
        dns: Option<Arc<dyn DnsLinkResolver>>,
        repo_root: impl Into<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
                keystore,
                routing,
                pubsub,
                dns,
                seq_dir: repo_root.into().join("ipns-seq"),
                max_seen: DashMap::new(),
                cache: DashMap::new(),
                subscribed: DashMap::new(),
            })
    }

    /// `publish(path, key-name, lifetime)`.
    pub async fn publish(&self, path: &str, key_name: &str, lifetime: StdDuration) -> Result<PublishedName> {
        let key_info = self
        .keystore
        .find_key_by_name(key_name)
        .await
        .map_err(|_| NamingError::KeyNotFound(key_name.to_string()))?;
        let peer_id = peer_id_from_public_key(&key_info.public_key);

        let previous = self.last_sequence(&peer_id).await?;
        let sequence = previous + 1;

        let validity = Utc::now()
        + chrono::Duration::from_std(lifetime).unwrap_or_else(|_| chrono::Duration::zero());
        let validity_bytes = NameRecord::format_validity(validity).into_bytes();
        let payload = NameRecord::signing_payload(path.as_bytes(), &validity_bytes, ValidityType::EndOfLife);
        let signature = self.keystore.compute_signature(key_name, &payload).await?;

        let record = NameRecord {
            value: path.to_string(),
            signature,
            validity,
            sequence,
            ttl_nanos: None,
            public_key: Some(key_info.public_key),
        };

        self.persist_sequence(&peer_id, sequence).await?;
        self.cache.insert(peer_id.clone(), record.clone());

        let topic = topic_for_peer(&peer_id);
        self.pubsub.publish(&topic, record.to_wire().encode_to_vec()).await?;

        Ok(PublishedName {
                name: format!("/ipns/{peer_id}"),
                path: path.to_string(),
            })
    }

    /// `resolve(name, recursive, no-cache)`.
    pub async fn resolve(self: &Arc<Self>, name: &str, recursive: bool, no_cache: bool) -> Result<String> {
        let mut current = name.strip_prefix("/ipns/").unwrap_or(name).to_string();
        for _ in 0..MAX_RESOLVE_DEPTH {
            let resolved = self.resolve_one(&current, no_cache).await?;
            if !recursive || resolved.starts_with("/ipfs/") {
                return Ok(resolved);
            }
            current = resolved.strip_prefix("/ipns/").unwrap_or(&resolved).to_string();
        }
        Err(NamingError::RecursionLimitExceeded)
    }

    async fn resolve_one(self: &Arc<Self>, name: &str, no_cache: bool) -> Result<String> {
        if name.contains('.') {
            if let Some(dns) = &self.dns {
                return dns.resolve(name).await;
            }
            return Err(NamingError::NotFound(name.to_string()));
        }

        self.subscribe_lazily(name).await?;

        if !no_cache {
            if let Some(record) = self.cache.get(name) {
                if !record.is_expired(Utc::now()) {
                    return Ok(record.value.clone());
                }
            }
        }

        let key = format!("/ipns/{name}");
        let bytes = self.routing.get(&key).await?;
        let record = self.decode_and_admit(name, &bytes).await?;
        Ok(record.value)
    }

    /// `Admit(peerId, record) -> accepted?`: the replay
    /// barrier. Rejects non-monotone sequences; otherwise persists the
    /// new high-water mark and replaces the cached record.
    pub async fn admit(&self, peer_id: &str, record: NameRecord) -> Result<bool> {
        let last = self.last_sequence(peer_id).await?;
        if record.sequence <= last {
            tracing::debug!(peer_id, incoming = record.sequence, last, "rejecting stale name record");
            return Ok(false);
        }
        self.persist_sequence(peer_id, record.sequence).await?;
        self.cache.insert(peer_id.to_string(), record);
        Ok(true)
    }

    async fn decode_and_admit(&self, peer_id: &str, wire_bytes: &[u8]) -> Result<NameRecord> {
        let entry = crate::record::IpnsEntry::decode(wire_bytes)
        .map_err(|e| NamingError::MalformedRecord(e.to_string()))?;
        let verifying_key = match &entry.pub_key {
            Some(key) => key.clone(),
            None => public_key_from_peer_id(peer_id)?,
        };
        let record = NameRecord::from_wire(entry, &verifying_key)?;
        if !self.admit(peer_id, record.clone()).await? {
            return Err(NamingError::StaleSequence {
                    incoming: record.sequence,
                    last_admitted: self.last_sequence(peer_id).await?,
                });
        }
        Ok(record)
    }

    async fn subscribe_lazily(self: &Arc<Self>, name: &str) -> Result<()> {
        if self.subscribed.contains_key(name) {
            return Ok(());
        }
        self.subscribed.insert(name.to_string(), ());

        let topic = topic_for_peer(name);
        let weak = Arc::downgrade(self);
        let name_owned = name.to_string();
        let handler: PubSubHandler = Arc::new(move |bytes| {
                let weak = weak.clone();
                let name_owned = name_owned.clone();
                tokio::spawn(async move {
                        if let Some(manager) = weak.upgrade() {
                            if let Err(e) = manager.decode_and_admit(&name_owned, &bytes).await {
                                tracing::debug!(error = %e, name = %name_owned, "discarding pub/sub name record");
                            }
                        }
                    });
            });
        self.pubsub.subscribe(&topic, handler).await
    }

    async fn last_sequence(&self, peer_id: &str) -> Result<u64> {
        if let Some(seq) = self.max_seen.get(peer_id) {
            return Ok(*seq);
        }
        let path = self.seq_dir.join(peer_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(s) => {
                let seq = s.trim().parse::<u64>().unwrap_or(0);
                self.max_seen.insert(peer_id.to_string(), seq);
                Ok(seq)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(NamingError::Io(e)),
        }
    }

    async fn persist_sequence(&self, peer_id: &str, seq: u64) -> Result<()> {
        tokio::fs::create_dir_all(&self.seq_dir).await?;
        let path = self.seq_dir.join(peer_id);
        let tmp_path = self.seq_dir.join(format!(".{peer_id}.tmp"));
        tokio::fs::write(&tmp_path, seq.to_string()).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        self.max_seen.insert(peer_id.to_string(), seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Dht, ProviderSink, RoutingKey};
    use cid::Cid;
    use ipfsd_crypto::{KeyType, MemoryKeystore};
    use std::sync::Mutex;

    struct NullDht;
    #[async_trait::async_trait]
    impl Dht for NullDht {
        async fn find_peer(&self, _peer_id: &str) -> Result<Vec<u8>> {
            Ok(vec![])
        }
        async fn find_providers(&self, _cid: &Cid, _limit: usize, _on_each: ProviderSink) -> Result<()> {
            Ok(())
        }
        async fn provide(&self, _cid: &Cid, _advertise: bool) -> Result<()> {
            Ok(())
        }
        async fn get(&self, _key: &RoutingKey) -> Result<Vec<u8>> {
            Err(NamingError::NotFound("no record published".into()))
        }
        async fn put(&self, _key: &RoutingKey, _value: Vec<u8>) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPubSub {
        published: Mutex<Vec<(String, Vec<u8>)>>,
    }
    #[async_trait::async_trait]
    impl PubSub for RecordingPubSub {
        async fn publish(&self, topic: &str, bytes: Vec<u8>) -> Result<()> {
            self.published.lock().unwrap().push((topic.to_string(), bytes));
            Ok(())
        }
        async fn subscribe(&self, _topic: &str, _handler: PubSubHandler) -> Result<()> {
            Ok(())
        }
    }

    fn manager(pubsub: Arc<RecordingPubSub>, dir: &std::path::Path) -> Arc<NameManager> {
        NameManager::new(Arc::new(MemoryKeystore::new()), RoutingFacade::new(Arc::new(NullDht)).into(), pubsub, None, dir)
    }

    #[tokio::test]
    async fn publish_signs_and_fans_out_over_pubsub() {
        let dir = tempfile::tempdir().unwrap();
        let pubsub = Arc::new(RecordingPubSub::default());
        let mgr = manager(pubsub.clone(), dir.path());
        mgr.keystore.create_key("self", KeyType::Ed25519).await.unwrap();

        let published = mgr
        .publish("/ipfs/QmContent", "self", StdDuration::from_secs(3600))
        .await
        .unwrap();
        assert!(published.name.starts_with("/ipns/"));
        assert_eq!(published.path, "/ipfs/QmContent");
        assert_eq!(pubsub.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn republish_increments_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let pubsub = Arc::new(RecordingPubSub::default());
        let mgr = manager(pubsub, dir.path());
        mgr.keystore.create_key("self", KeyType::Ed25519).await.unwrap();

        mgr.publish("/ipfs/A", "self", StdDuration::from_secs(60)).await.unwrap();
        mgr.publish("/ipfs/B", "self", StdDuration::from_secs(60)).await.unwrap();

        let key_info = mgr.keystore.find_key_by_name("self").await.unwrap();
        let peer_id = peer_id_from_public_key(&key_info.public_key);
        assert_eq!(mgr.last_sequence(&peer_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn admit_rejects_non_monotone_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let pubsub = Arc::new(RecordingPubSub::default());
        let mgr = manager(pubsub, dir.path());

        let record = NameRecord {
            value: "/ipfs/A".into(),
            signature: vec![],
            validity: Utc::now() + chrono::Duration::hours(1),
            sequence: 5,
            ttl_nanos: None,
            public_key: None,
        };
        assert!(mgr.admit("peer-x", record.clone()).await.unwrap());
        let stale = NameRecord { sequence: 5,..record.clone() };
        assert!(!mgr.admit("peer-x", stale).await.unwrap());
        let fresh = NameRecord { sequence: 6,..record };
        assert!(mgr.admit("peer-x", fresh).await.unwrap());
    }

    #[tokio::test]
    async fn admit_survives_cache_eviction_via_persisted_file() {
        let dir = tempfile::tempdir().unwrap();
        let pubsub = Arc::new(RecordingPubSub::default());
        let mgr = manager(pubsub.clone(), dir.path());
        let record = NameRecord {
            value: "/ipfs/A".into(),
            signature: vec![],
            validity: Utc::now() + chrono::Duration::hours(1),
            sequence: 3,
            ttl_nanos: None,
            public_key: None,
        };
        mgr.admit("peer-x", record).await.unwrap();

        // A fresh manager pointed at the same repo root has no
        // in-memory cache but still rejects a replay via the
        // persisted sequence file.
        let mgr2 = manager(pubsub, dir.path());
        let replay = NameRecord {
            value: "/ipfs/B".into(),
            signature: vec![],
            validity: Utc::now() + chrono::Duration::hours(1),
            sequence: 3,
            ttl_nanos: None,
            public_key: None,
        };
        assert!(!mgr2.admit("peer-x", replay).await.unwrap());
    }

    #[tokio::test]
    async fn resolve_without_a_published_record_fails_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let pubsub = Arc::new(RecordingPubSub::default());
        let mgr = manager(pubsub, dir.path());
        assert!(mgr.resolve("/ipns/nonexistent", false, true).await.is_err());
    }
}
