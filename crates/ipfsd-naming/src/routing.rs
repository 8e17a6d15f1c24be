//! The Routing Facade and the DHT/pub-sub collaborator
//! traits it dispatches to ("External collaborators'
//! interfaces consumed by the core").
//!
//! The facade validates key shape and otherwise adds no logic of its
//! own; the real DHT algorithm, swarm dialling, and pub/sub fan-out
//! live outside this crate and are supplied at construction time as
//! trait objects, the same external-collaborator pattern
//! `ipfsd-exchange::ExchangeTransport` uses for the swarm stream.

use crate::error::{NamingError, Result};
use async_trait::async_trait;
use cid::Cid;
use std::sync::Arc;

/// A routing key, restricted to `/ipns/<id>` or `/pk/<id>` shapes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingKey(String);

impl RoutingKey {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.starts_with("/ipns/") || raw.starts_with("/pk/") {
            Ok(Self(raw.to_string()))
        } else {
            Err(NamingError::MalformedRecord(format!(
                        "unknown routing key shape: {raw}"
                    )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The DHT external collaborator: `findPeer`,
/// `findProviders`, `provide`, `get`, `put`.
#[async_trait]
pub trait Dht: Send + Sync {
    /// Locate a peer's known addresses by id. Returns the opaque
    /// peer-info bytes the swarm collaborator understands; the facade
    /// does not interpret them.
    async fn find_peer(&self, peer_id: &str) -> Result<Vec<u8>>;

    /// Walk the DHT for up to `limit` providers of `cid`, invoking
    /// `on_each` as each is discovered. Returns once `limit` providers
    /// have been found or the walk is exhausted.
    async fn find_providers(&self, cid: &Cid, limit: usize, on_each: ProviderSink) -> Result<()>;

    /// Announce that this node holds `cid`. `advertise` controls
    /// whether the announcement is pushed now or only recorded for a
    /// future periodic re-provide.
    async fn provide(&self, cid: &Cid, advertise: bool) -> Result<()>;

    /// Fetch the value stored at `key`.
    async fn get(&self, key: &RoutingKey) -> Result<Vec<u8>>;

    /// Store `value` at `key`. Callers that want a "touch" semantic
    /// pass the key's own bytes as the value explicitly; this facade
    /// never invents a value on a caller's behalf.
    async fn put(&self, key: &RoutingKey, value: Vec<u8>) -> Result<()>;
}

/// Callback invoked once per provider `find_providers` discovers.
pub type ProviderSink = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// The pub/sub external collaborator: topic publish and
/// subscribe. The Name Record Manager uses this to fan out freshly
/// published records and to receive records other publishers push.
#[async_trait]
pub trait PubSub: Send + Sync {
    async fn publish(&self, topic: &str, bytes: Vec<u8>) -> Result<()>;

    /// Subscribe to `topic`; `handler` is invoked once per message
    /// delivered on it. Implementations own the subscription's
    /// lifetime; there is no unsubscribe in this facade because
    /// Name Record Manager only ever subscribes, never
    /// unsubscribes, for the lifetime of a resolved name.
    async fn subscribe(&self, topic: &str, handler: PubSubHandler) -> Result<()>;
}

/// Callback invoked once per message delivered on a subscribed topic.
pub type PubSubHandler = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// A thin, uniform find/provide/get/put surface over a [`Dht`]
/// collaborator. Validates key shape on entry; adds no
/// other logic.
pub struct RoutingFacade {
    dht: Arc<dyn Dht>,
}

impl RoutingFacade {
    pub fn new(dht: Arc<dyn Dht>) -> Self {
        Self { dht }
    }

    pub async fn find_peer(&self, peer_id: &str) -> Result<Vec<u8>> {
        self.dht.find_peer(peer_id).await
    }

    pub async fn find_providers(&self, cid: &Cid, limit: usize, on_each: ProviderSink) -> Result<()> {
        self.dht.find_providers(cid, limit, on_each).await
    }

    pub async fn provide(&self, cid: &Cid, advertise: bool) -> Result<()> {
        self.dht.provide(cid, advertise).await
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let key = RoutingKey::parse(key)?;
        self.dht.get(&key).await
    }

    pub async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let key = RoutingKey::parse(key)?;
        self.dht.put(&key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ipns_and_pk_prefixes() {
        assert!(RoutingKey::parse("/ipns/QmPeer").is_ok());
        assert!(RoutingKey::parse("/pk/QmPeer").is_ok());
    }

    #[test]
    fn rejects_unknown_prefix() {
        assert!(RoutingKey::parse("/ipfs/QmData").is_err());
        assert!(RoutingKey::parse("nonsense").is_err());
    }

    struct StubDht;

    #[async_trait]
    impl Dht for StubDht {
        async fn find_peer(&self, _peer_id: &str) -> Result<Vec<u8>> {
            Ok(vec![])
        }
        async fn find_providers(&self, _cid: &Cid, _limit: usize, _on_each: ProviderSink) -> Result<()> {
            Ok(())
        }
        async fn provide(&self, _cid: &Cid, _advertise: bool) -> Result<()> {
            Ok(())
        }
        async fn get(&self, key: &RoutingKey) -> Result<Vec<u8>> {
            Ok(key.as_str().as_bytes().to_vec())
        }
        async fn put(&self, _key: &RoutingKey, _value: Vec<u8>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn facade_rejects_bad_key_before_reaching_the_dht() {
        let facade = RoutingFacade::new(Arc::new(StubDht));
        assert!(facade.get("/ipfs/nope").await.is_err());
        assert_eq!(facade.get("/ipns/abc").await.unwrap(), b"/ipns/abc".to_vec());
    }
}
