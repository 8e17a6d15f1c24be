//! The Block Layer: the composition root sitting atop the Block Store,
//! Exchange Engine, Pin Set, and Routing Facade.
//!
//! Lives here rather than in `ipfsd-block` because it is the first
//! point in the dependency graph where all four of those crates meet.

use crate::error::{NodeError, Result};
use bytes::Bytes;
use cid::Cid;
use ipfsd_block::cid::{self as cidutil, Codec, DEFAULT_INLINE_LIMIT, MAX_BLOCK_SIZE};
use ipfsd_block::{Block, BlockRef, BlockStore};
use ipfsd_crypto::HashAlgorithm;
use ipfsd_exchange::{Exchange, ExchangeTransport};
use ipfsd_naming::routing::RoutingFacade;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Up to this many providers are dialled concurrently while a `get`'s
/// want is also in flight.
const MAX_PROVIDERS_TO_DIAL: usize = 20;

/// Options for [`BlockLayer::put`].
#[derive(Clone)]
pub struct PutOptions {
    pub codec: Codec,
    pub hash_alg: HashAlgorithm,
    pub pin: bool,
    pub allow_big: bool,
    pub inline: bool,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            codec: Codec::Raw,
            hash_alg: HashAlgorithm::DEFAULT,
            pin: false,
            allow_big: false,
            inline: true,
        }
    }
}

/// The peer-dialling half of a `get`'s network fetch: ask
/// the routing facade for providers and hand each one to the swarm.
/// Narrowed to just this so [`BlockLayer`] stays generic only over the
/// exchange transport, not also the swarm implementation.
#[async_trait::async_trait]
pub trait ProviderDialer: Send + Sync {
    async fn dial(&self, peer_info: Vec<u8>);
}

pub struct BlockLayer<T: ExchangeTransport> {
    store: Arc<dyn BlockStore>,
    exchange: Arc<Exchange<T>>,
    pins: Arc<ipfsd_block::pinset::PinSet>,
    routing: Arc<RoutingFacade>,
    dialer: Option<Arc<dyn ProviderDialer>>,
}

impl<T: ExchangeTransport + 'static> BlockLayer<T> {
    pub fn new(
        store: Arc<dyn BlockStore>,
        exchange: Arc<Exchange<T>>,
        pins: Arc<ipfsd_block::pinset::PinSet>,
        routing: Arc<RoutingFacade>,
        dialer: Option<Arc<dyn ProviderDialer>>,
    ) -> Self {
        Self {
            store,
            exchange,
            pins,
            routing,
            dialer,
        }
    }

    /// `put(bytes, codec, hash-alg?, pin?, allow-big?)`.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn put(&self, data: Bytes, options: PutOptions) -> Result<BlockRef> {
        if data.len() > MAX_BLOCK_SIZE && !options.allow_big {
            return Err(NodeError::InvalidArgument(format!(
                        "block too large: {} bytes exceeds limit of {MAX_BLOCK_SIZE} bytes",
                        data.len()
                    )));
        }

        if options.inline && data.len() <= DEFAULT_INLINE_LIMIT {
            let cid = cidutil::build_cid(options.codec, HashAlgorithm::Identity, &data)?;
            return Ok(BlockRef::new(cid, data.len() as u64));
        }

        let block = Block::encode(options.codec, options.hash_alg, data)?;
        self.store.put(&block).await?;

        // A locally-produced block is visible to waiters before `put`
        // returns to its caller.
        self.exchange.found(block.clone());
        self.advertise(block.cid);

        if options.pin {
            self.pins.add(block.cid, false, self.store.as_ref()).await?;
        }

        Ok(BlockRef::from(&block))
    }

    /// Advertise a freshly-written CID to the routing system in a
    /// background task; errors are logged, never propagated to `put`'s
    /// caller.
    fn advertise(&self, cid: Cid) {
        let routing = Arc::clone(&self.routing);
        tokio::spawn(async move {
                if let Err(err) = routing.provide(&cid, true).await {
                    tracing::debug!(%cid, %err, "failed to advertise block to routing system");
                }
            });
    }

    /// `get(cid)`.
    pub async fn get(&self, cid: &Cid, cancel: CancellationToken) -> Result<Bytes> {
        if cidutil::is_identity(cid) {
            return Ok(Bytes::copy_from_slice(cidutil::inline_bytes(cid)));
        }

        if let Some(block) = self.store.try_get(cid).await? {
            return Ok(block.data);
        }

        let ticket = self.exchange.want(*cid, None).await;

        let discovery_cancel = CancellationToken::new();
        let discovery = self.spawn_discovery(*cid, discovery_cancel.clone());

        let result = self.exchange.wait(ticket, cancel).await;
        discovery_cancel.cancel();
        let _ = discovery.await;

        result.map(|b| b.data).map_err(|_| NodeError::Cancelled)
    }

    /// `stat(cid)`: same lookup order as `get`, without
    /// returning the full bytes.
    pub async fn stat(&self, cid: &Cid, cancel: CancellationToken) -> Result<BlockRef> {
        if cidutil::is_identity(cid) {
            return Ok(BlockRef::new(*cid, cidutil::inline_bytes(cid).len() as u64));
        }
        if let Some(size) = self.store.length(cid).await? {
            return Ok(BlockRef::new(*cid, size));
        }
        let data = self.get(cid, cancel).await?;
        Ok(BlockRef::new(*cid, data.len() as u64))
    }

    /// `remove(cid, ignoreNonexistent?)`.
    pub async fn remove(&self, cid: &Cid, ignore_nonexistent: bool) -> Result<Cid> {
        let removed = self.store.remove(cid).await?;
        if !removed && !ignore_nonexistent && !cidutil::is_identity(cid) {
            return Err(NodeError::NotFound);
        }
        let _ = self.pins.remove(*cid, false, self.store.as_ref()).await;
        Ok(*cid)
    }

    /// Concurrently ask the routing facade for up to
    /// [`MAX_PROVIDERS_TO_DIAL`] providers of `cid` and hand each to the
    /// configured [`ProviderDialer`]; cancelled as soon as the exchange's
    /// want for the same CID resolves first.
    fn spawn_discovery(&self, cid: Cid, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let routing = Arc::clone(&self.routing);
        let dialer = self.dialer.clone();
        tokio::spawn(async move {
                let Some(dialer) = dialer else { return };
                let sink: ipfsd_naming::routing::ProviderSink = {
                    let dialer = Arc::clone(&dialer);
                    Arc::new(move |peer_info: Vec<u8>| {
                            let dialer = Arc::clone(&dialer);
                            tokio::spawn(async move { dialer.dial(peer_info).await });
                        })
                };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = routing.find_providers(&cid, MAX_PROVIDERS_TO_DIAL, sink) => {}
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ipfsd_block::memory_store::MemoryBlockStore;
    use ipfsd_exchange::want::PeerId;
    use ipfsd_naming::routing::{Dht, ProviderSink, PubSub, PubSubHandler, RoutingKey};

    struct NullTransport;

    #[async_trait::async_trait]
    impl ExchangeTransport for NullTransport {
        async fn connected_peers(&self) -> Vec<PeerId> {
            Vec::new()
        }
        async fn send(
            &self,
            _peer: &PeerId,
            _protocol: &str,
            _message: ipfsd_exchange::message::ExchangeMessage,
        ) -> ipfsd_exchange::Result<()> {
            Ok(())
        }
    }

    struct NullDht;

    #[async_trait::async_trait]
    impl Dht for NullDht {
        async fn find_peer(&self, _peer_id: &str) -> ipfsd_naming::Result<Vec<u8>> {
            Ok(vec![])
        }
        async fn find_providers(&self, _cid: &Cid, _limit: usize, _on_each: ProviderSink) -> ipfsd_naming::Result<()> {
            Ok(())
        }
        async fn provide(&self, _cid: &Cid, _advertise: bool) -> ipfsd_naming::Result<()> {
            Ok(())
        }
        async fn get(&self, _key: &RoutingKey) -> ipfsd_naming::Result<Vec<u8>> {
            Ok(vec![])
        }
        async fn put(&self, _key: &RoutingKey, _value: Vec<u8>) -> ipfsd_naming::Result<()> {
            Ok(())
        }
    }

    #[allow(dead_code)]
    struct NullPubSub;

    #[async_trait::async_trait]
    impl PubSub for NullPubSub {
        async fn publish(&self, _topic: &str, _bytes: Vec<u8>) -> ipfsd_naming::Result<()> {
            Ok(())
        }
        async fn subscribe(&self, _topic: &str, _handler: PubSubHandler) -> ipfsd_naming::Result<()> {
            Ok(())
        }
    }

    async fn make_layer() -> (BlockLayer<NullTransport>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
        let exchange = Exchange::new(Arc::new(NullTransport));
        let pins = Arc::new(ipfsd_block::pinset::PinSet::open(dir.path()).await.unwrap());
        let routing = Arc::new(RoutingFacade::new(Arc::new(NullDht)));
        (BlockLayer::new(store, exchange, pins, routing, None), dir)
    }

    struct SpyDht {
        provided: std::sync::Mutex<Vec<Cid>>,
    }

    #[async_trait::async_trait]
    impl Dht for SpyDht {
        async fn find_peer(&self, _peer_id: &str) -> ipfsd_naming::Result<Vec<u8>> {
            Ok(vec![])
        }
        async fn find_providers(&self, _cid: &Cid, _limit: usize, _on_each: ProviderSink) -> ipfsd_naming::Result<()> {
            Ok(())
        }
        async fn provide(&self, cid: &Cid, _advertise: bool) -> ipfsd_naming::Result<()> {
            self.provided.lock().unwrap().push(*cid);
            Ok(())
        }
        async fn get(&self, _key: &RoutingKey) -> ipfsd_naming::Result<Vec<u8>> {
            Ok(vec![])
        }
        async fn put(&self, _key: &RoutingKey, _value: Vec<u8>) -> ipfsd_naming::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn put_advertises_the_new_cid_to_routing() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
        let exchange = Exchange::new(Arc::new(NullTransport));
        let pins = Arc::new(ipfsd_block::pinset::PinSet::open(dir.path()).await.unwrap());
        let dht = Arc::new(SpyDht {
                provided: std::sync::Mutex::new(Vec::new()),
            });
        let routing = Arc::new(RoutingFacade::new(Arc::clone(&dht) as Arc<dyn Dht>));
        let layer = BlockLayer::new(store, exchange, pins, routing, None);

        let block_ref = layer
        .put(Bytes::from_static(b"advertise this block past the inline threshold"), PutOptions { inline: false,..Default::default() })
        .await
        .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(dht.provided.lock().unwrap().as_slice(), &[block_ref.cid]);
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let (layer, _dir) = make_layer().await;
        let block_ref = layer
        .put(Bytes::from_static(b"hello world, this is longer than the inline limit threshold"), PutOptions::default())
        .await
        .unwrap();
        let data = layer.get(&block_ref.cid, CancellationToken::new()).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"hello world, this is longer than the inline limit threshold"));
    }

    #[tokio::test]
    async fn small_block_inlines_without_touching_store() {
        let (layer, _dir) = make_layer().await;
        let block_ref = layer.put(Bytes::from_static(b"blorb"), PutOptions::default()).await.unwrap();
        assert!(cidutil::is_identity(&block_ref.cid));
        let data = layer.get(&block_ref.cid, CancellationToken::new()).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"blorb"));
    }

    #[tokio::test]
    async fn too_large_without_allow_big_is_rejected() {
        let (layer, _dir) = make_layer().await;
        let data = Bytes::from(vec![0u8; MAX_BLOCK_SIZE + 1]);
        let err = layer.put(data, PutOptions { inline: false,..Default::default() }).await.unwrap_err();
        assert!(matches!(err, NodeError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn exactly_max_size_is_accepted() {
        let (layer, _dir) = make_layer().await;
        let data = Bytes::from(vec![0u8; MAX_BLOCK_SIZE]);
        let result = layer.put(data, PutOptions { inline: false,..Default::default() }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let (layer, _dir) = make_layer().await;
        let options = PutOptions { inline: false,..Default::default() };
        let a = layer.put(Bytes::from_static(b"repeatable bytes over inline"), options.clone()).await.unwrap();
        let b = layer.put(Bytes::from_static(b"repeatable bytes over inline"), options).await.unwrap();
        assert_eq!(a.cid, b.cid);
    }

    #[tokio::test]
    async fn remove_nonexistent_without_ignore_flag_errors() {
        let (layer, _dir) = make_layer().await;
        let bogus = ipfsd_block::cid::build_cid(Codec::Raw, HashAlgorithm::Sha2_256, b"never stored").unwrap();
        assert!(layer.remove(&bogus, false).await.is_err());
        assert!(layer.remove(&bogus, true).await.is_ok());
    }

    #[tokio::test]
    async fn get_on_missing_block_is_cancellable() {
        let (layer, _dir) = make_layer().await;
        let missing = ipfsd_block::cid::build_cid(Codec::Raw, HashAlgorithm::Sha2_256, b"nope, never arrives").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = layer.get(&missing, cancel).await;
        assert!(matches!(result, Err(NodeError::Cancelled)));
    }
}
