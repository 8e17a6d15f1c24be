//! The exchange engine's view of the Swarm external collaborator,
//! narrowed to the two operations the engine itself needs — who is
//! currently connected, and fire-and-forget delivery of one message to
//! one peer over one negotiated stream protocol. Dialling, multiplexing,
//! and identify/ping stay entirely on the Swarm side of this trait.

use crate::error::Result;
use crate::message::ExchangeMessage;
use crate::want::PeerId;
use async_trait::async_trait;

/// The subset of Swarm behavior the exchange engine drives directly.
///
/// Implementations are expected to open (or reuse) a stream to `peer`
/// speaking `protocol`, write the length-prefixed encoding of
/// `message`, and report failure without the engine ever blocking on a
/// specific peer's responsiveness, since a dial failure to one peer
/// aborts only that peer's branch of a broadcast.
#[async_trait]
pub trait ExchangeTransport: Send + Sync {
    /// Peers the swarm currently holds an open connection to.
    async fn connected_peers(&self) -> Vec<PeerId>;

    /// Send `message` to `peer` over `protocol`. Returns an error if
    /// the peer rejects the protocol or the dial fails; the engine
    /// interprets any error the same way (try the next protocol, or
    /// give up on this peer).
    async fn send(&self, peer: &PeerId, protocol: &str, message: ExchangeMessage) -> Result<()>;
}
