//! End-to-end coverage for the repository lifecycle: a fresh repo is
//! migrated to its latest version, a file is chunked and stored through
//! the Block Layer, pinned, archived to a CAR stream, and recovered
//! from a brand new store by importing that stream, driven end-to-end
//! rather than unit-testing each step in isolation.

use bytes::Bytes;
use ipfsd::block::cid::Codec;
use ipfsd::block::fs_store::FsBlockStore;
use ipfsd::block::memory_store::MemoryBlockStore;
use ipfsd::block::pinset::PinSet;
use ipfsd::block::{car, BlockStore};
use ipfsd_crypto::HashAlgorithm;
use ipfsd_exchange::{Exchange, ExchangeTransport, PeerId};
use ipfsd_naming::routing::{Dht, ProviderSink, RoutingFacade, RoutingKey};
use ipfsd_node::migrator::{default_migrations, LATEST_VERSION};
use ipfsd_node::{BlockLayer, Migrator, PutOptions};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

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
    async fn find_providers(&self, _cid: &cid::Cid, _limit: usize, _on_each: ProviderSink) -> ipfsd_naming::Result<()> {
        Ok(())
    }
    async fn provide(&self, _cid: &cid::Cid, _advertise: bool) -> ipfsd_naming::Result<()> {
        Ok(())
    }
    async fn get(&self, _key: &RoutingKey) -> ipfsd_naming::Result<Vec<u8>> {
        Ok(vec![])
    }
    async fn put(&self, _key: &RoutingKey, _value: Vec<u8>) -> ipfsd_naming::Result<()> {
        Ok(())
    }
}

fn make_block_layer(
    store: Arc<dyn BlockStore>,
    pins: Arc<PinSet>,
) -> BlockLayer<NullTransport> {
    let exchange = Exchange::new(Arc::new(NullTransport));
    let routing = Arc::new(RoutingFacade::new(Arc::new(NullDht)));
    BlockLayer::new(store, exchange, pins, routing, None)
}

#[tokio::test]
async fn fresh_repository_migrates_stores_pins_and_archives() {
    let repo = tempfile::tempdir().unwrap();

    let migrator = Migrator::new(repo.path(), default_migrations());
    migrator.migrate_to(LATEST_VERSION).await.unwrap();
    assert_eq!(migrator.current_version().await.unwrap(), LATEST_VERSION);
    assert!(repo.path().join("pins").is_dir());
    assert!(repo.path().join("ipns-seq").is_dir());

    let store: Arc<dyn BlockStore> = Arc::new(FsBlockStore::open(repo.path()).await.unwrap());
    let pins = Arc::new(PinSet::open(repo.path()).await.unwrap());
    let layer = make_block_layer(Arc::clone(&store), Arc::clone(&pins));

    let payload = Bytes::from(hex::decode("deadbeef00ff00ff".repeat(8)).unwrap());
    let block_ref = layer
    .put(
        payload.clone(),
        PutOptions {
            codec: Codec::Raw,
            hash_alg: HashAlgorithm::Sha2_256,
            pin: true,
            allow_big: false,
            inline: false,
        },
    )
    .await
    .unwrap();

    assert!(pins.is_pinned(&block_ref.cid).await.unwrap());

    let fetched = layer.get(&block_ref.cid, CancellationToken::new()).await.unwrap();
    assert_eq!(fetched, payload);

    let mut archive = Vec::new();
    car::export(&mut archive, &[block_ref.cid], store.as_ref()).await.unwrap();

    let recovered_store = MemoryBlockStore::new();
    let imported = car::import(&mut archive.as_slice(), &recovered_store, None).await.unwrap();
    assert_eq!(imported.roots, vec![block_ref.cid]);
    assert_eq!(recovered_store.try_get(&block_ref.cid).await.unwrap().unwrap().data, payload);
}

#[tokio::test]
async fn repository_downgrade_removes_versioned_directories() {
    let repo = tempfile::tempdir().unwrap();
    let migrator = Migrator::new(repo.path(), default_migrations());
    migrator.migrate_to(LATEST_VERSION).await.unwrap();
    migrator.migrate_to(0).await.unwrap();
    assert_eq!(migrator.current_version().await.unwrap(), 0);
}
