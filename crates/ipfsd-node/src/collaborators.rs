//! The Swarm external collaborator, narrowed further than
//! `ipfsd_exchange::ExchangeTransport` to the lifecycle surface the
//! Engine Core itself drives: dialling, connection-established
//! notification, and the set of known peers. Dial, multiplexing,
//! identify/ping, and TLS/Noise live entirely outside this workspace.

use async_trait::async_trait;
use ipfsd_exchange::PeerId;
use std::sync::Arc;

/// An established connection's identity-resolution future: the swarm
/// resolves a peer's protocol identity asynchronously after the
/// transport handshake completes, yielding a peer id once identity is
/// confirmed.
#[async_trait]
pub trait IdentityHandle: Send + Sync {
    async fn wait_established(&self) -> PeerId;
}

/// Invoked once per new connection, after identity has been
/// established. The Engine Core uses this to start one exchange
/// reader task per peer: a want issued before a peer connection is
/// established is sent to that peer only after identity is confirmed.
pub type ConnectionHandler = Arc<dyn Fn(PeerId) + Send + Sync>;

/// The lifecycle subset of the Swarm collaborator the Engine Core
/// drives directly.
#[async_trait]
pub trait Swarm: Send + Sync {
    /// Dial a multiaddress, establishing (or reusing) a connection.
    async fn connect(&self, multiaddress: &str) -> anyhow::Result<()>;

    /// Peers the swarm currently holds an open connection to.
    async fn known_peers(&self) -> Vec<PeerId>;

    /// Register a handler invoked for every connection the swarm
    /// establishes for the remainder of the process.
    fn on_connection_established(&self, handler: ConnectionHandler);

    /// Dial a peer using the opaque peer-info bytes a [`crate::block_layer`]
    /// `get` received from `Dht::find_providers`. The block layer does
    /// not interpret these bytes; the swarm collaborator
    /// alone knows how to turn them into a connection attempt.
    async fn dial_provider(&self, peer_info: &[u8]) -> anyhow::Result<()>;
}
