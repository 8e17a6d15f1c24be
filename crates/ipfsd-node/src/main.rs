//! ipfsd node binary: loads the repository config, steps the on-disk
//! version to the latest migration, wires the Block Layer / Exchange
//! Engine / Name Manager / Routing Facade together with no-op Swarm/
//! DHT/PubSub collaborators (real transport, DHT, and pub/sub
//! implementations live outside this workspace), and runs until
//! interrupted.

use clap::Parser;
use ipfsd_block::fs_store::FsBlockStore;
use ipfsd_block::memory_store::MemoryBlockStore;
use ipfsd_block::pinset::PinSet;
use ipfsd_block::BlockStore;
use ipfsd_crypto::keystore::{KeyType, MemoryKeystore};
use ipfsd_exchange::{Exchange, ExchangeTransport, PeerId};
use ipfsd_naming::routing::{Dht, ProviderSink, PubSub, PubSubHandler, RoutingFacade, RoutingKey};
use ipfsd_naming::NameManager;
use ipfsd_node::collaborators::{ConnectionHandler, Swarm};
use ipfsd_node::{BlockLayer, Engine, Migrator};
use ipfsd_node::migrator::{default_migrations, LATEST_VERSION};
use ipfsd_node::config::RepoConfig;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ipfsd")]
#[command(about = "IPFS 0.40-compatible content-addressed node core")]
#[command(version)]
struct Args {
    /// Repository root directory
    #[arg(short = 'r', long, default_value = ".ipfsd", env = "IPFSD_REPO")]
    repo: std::path::PathBuf,

    /// Use in-memory storage (for testing, data will not persist)
    #[arg(long, env = "IPFSD_MEMORY_STORE")]
    memory_store: bool,

    /// Run the background discovery walk
    #[arg(long, env = "IPFSD_DISCOVERY")]
    discovery: bool,

    /// Enable debug logging
    #[arg(short, long, env = "IPFSD_DEBUG")]
    debug: bool,
}

/// A `Dht`/`PubSub`/`Swarm` collaborator set that does nothing: the real
/// implementations live outside this workspace's scope.
/// Running the binary with these wired in exercises the node core's
/// local-only behavior (store, pin, chunk, archive) without a network.
struct NoopCollaborators;

#[async_trait::async_trait]
impl Dht for NoopCollaborators {
    async fn find_peer(&self, _peer_id: &str) -> ipfsd_naming::Result<Vec<u8>> {
        Ok(Vec::new())
    }
    async fn find_providers(&self, _cid: &cid::Cid, _limit: usize, _on_each: ProviderSink) -> ipfsd_naming::Result<()> {
        Ok(())
    }
    async fn provide(&self, _cid: &cid::Cid, _advertise: bool) -> ipfsd_naming::Result<()> {
        Ok(())
    }
    async fn get(&self, _key: &RoutingKey) -> ipfsd_naming::Result<Vec<u8>> {
        Err(ipfsd_naming::NamingError::NotFound("no DHT collaborator configured".into()))
    }
    async fn put(&self, _key: &RoutingKey, _value: Vec<u8>) -> ipfsd_naming::Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl PubSub for NoopCollaborators {
    async fn publish(&self, _topic: &str, _bytes: Vec<u8>) -> ipfsd_naming::Result<()> {
        Ok(())
    }
    async fn subscribe(&self, _topic: &str, _handler: PubSubHandler) -> ipfsd_naming::Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl Swarm for NoopCollaborators {
    async fn connect(&self, _multiaddress: &str) -> anyhow::Result<()> {
        Ok(())
    }
    async fn known_peers(&self) -> Vec<PeerId> {
        Vec::new()
    }
    fn on_connection_established(&self, _handler: ConnectionHandler) {}
    async fn dial_provider(&self, _peer_info: &[u8]) -> anyhow::Result<()> {
        Ok(())
    }
}

struct NoopTransport;

#[async_trait::async_trait]
impl ExchangeTransport for NoopTransport {
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
    .with(
        tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ipfsd={log_level}").into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

    tracing::info!(repo = %args.repo.display(), "starting ipfsd");
    if args.memory_store {
        tracing::warn!("using in-memory storage - data will NOT persist");
    }

    tokio::fs::create_dir_all(&args.repo).await?;
    let config = RepoConfig::load_or_init(&args.repo).await?;
    tracing::info!(swarm = ?config.addresses.swarm, "repository config loaded");

    let migrator = Migrator::new(args.repo.clone(), default_migrations());
    migrator.migrate_to(LATEST_VERSION).await?;

    let store: Arc<dyn BlockStore> = if args.memory_store {
        Arc::new(MemoryBlockStore::new())
    } else {
        Arc::new(FsBlockStore::open(&args.repo).await?)
    };
    let pins = Arc::new(PinSet::open(&args.repo).await?);

    let collaborators = Arc::new(NoopCollaborators);
    let keystore = MemoryKeystore::shared();
    keystore.create_key("self", KeyType::Ed25519).await.ok();

    let routing = Arc::new(RoutingFacade::new(Arc::clone(&collaborators) as Arc<dyn Dht>));
    let names = NameManager::new(
        keystore,
        Arc::clone(&routing),
        Arc::clone(&collaborators) as Arc<dyn PubSub>,
        None,
        args.repo.clone(),
    );

    let exchange = Exchange::new(Arc::new(NoopTransport));
    let block_layer = Arc::new(BlockLayer::new(
            Arc::clone(&store),
            Arc::clone(&exchange),
            Arc::clone(&pins),
            Arc::clone(&routing),
            None,
        ));

    let engine = Arc::new(Engine::new(
            block_layer,
            exchange,
            pins,
            store,
            routing,
            names,
            Arc::clone(&collaborators) as Arc<dyn Swarm>,
        ));
    engine.start(args.discovery).await?;

    tracing::info!("ipfsd running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    engine.shutdown();
    tracing::info!("ipfsd shutting down");

    Ok(())
}
