//! The Exchange Engine: the concurrent want-tracking, broadcast, and
//! incoming-message core of block exchange.
//!
//! `wants` and `ledgers` are `DashMap`s, the same concurrent-map
//! approach this workspace's block stores use for their own tables,
//! applied here to track in-flight wants and per-peer ledgers
//! independently. Inbound messages (wantlist entries, payload blocks,
//! presence entries) are dispatched per peer, one handler per message
//! kind.

use crate::error::{ExchangeError, Result};
use crate::ledger::PeerLedger;
use crate::message::{
    BlockPresence, BlockPresenceType, Entry, ExchangeMessage, PayloadBlock, WantType, Wantlist,
};
use crate::prefix::CidPrefix;
use crate::protocol::{self, ProtocolEntry};
use crate::transport::ExchangeTransport;
use crate::want::{PeerId, WaiterId, WantEntry};
use bytes::Bytes;
use cid::Cid;
use dashmap::DashMap;
use ipfsd_block::{Block, BlockStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// How long [`Exchange::broadcast_wantlist`] waits for every connected
/// peer's dispatch before giving up on the stragglers. This bounds the
/// fan-out itself, not any individual `get`.
const BROADCAST_DEADLINE: Duration = Duration::from_secs(5);

/// A handle returned by [`Exchange::want`]; pass it to [`Exchange::wait`]
/// to block until the block arrives or `cancel` fires.
pub struct WantTicket {
    pub cid: Cid,
    waiter_id: WaiterId,
    rx: oneshot::Receiver<Block>,
}

/// The want-driven block exchange engine.
pub struct Exchange<T: ExchangeTransport> {
    wants: DashMap<Cid, WantEntry>,
    ledgers: DashMap<PeerId, PeerLedger>,
    transport: Arc<T>,
}

impl<T: ExchangeTransport + 'static> Exchange<T> {
    pub fn new(transport: Arc<T>) -> Arc<Self> {
        Arc::new(Self {
                wants: DashMap::new(),
                ledgers: DashMap::new(),
                transport,
            })
    }

    /// Number of CIDs with at least one active waiter.
    pub fn want_count(&self) -> usize {
        self.wants.len()
    }

    /// Whether any waiter is currently registered for `cid`.
    pub fn is_wanted(&self, cid: &Cid) -> bool {
        self.wants.contains_key(cid)
    }

    /// A snapshot of the ledger kept for `peer`.
    pub fn ledger(&self, peer: &PeerId) -> PeerLedger {
        self.ledgers.get(peer).map(|l| *l.value()).unwrap_or_default()
    }

    /// `want(cid, peer, waiter)`: register a new waiter
    /// for `cid`, optionally associating `peer` as a known wanter of
    /// it, and — if this is the first waiter — broadcast a wantlist
    /// update to every connected peer and raise a "block needed"
    /// notification.
    pub async fn want(self: &Arc<Self>, cid: Cid, peer_hint: Option<PeerId>) -> WantTicket {
        let (tx, rx) = oneshot::channel();
        let (waiter_id, is_first) = {
            let mut entry = self.wants.entry(cid).or_insert_with(WantEntry::new);
            if let Some(peer) = peer_hint {
                entry.peers.insert(peer);
            }
            entry.push_waiter(tx)
        };
        if is_first {
            tracing::debug!(%cid, "block needed");
            let engine = Arc::clone(self);
            tokio::spawn(async move { engine.broadcast_wantlist(cid).await });
        }
        WantTicket { cid, waiter_id, rx }
    }

    /// Await delivery of `ticket`'s block. Cancelling `cancel` drops
    /// this caller's waiter and, if it was the last one, removes the
    /// Want Entry — the other peers are not told.
    pub async fn wait(&self, ticket: WantTicket, cancel: CancellationToken) -> Result<Block> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.cancel(&ticket.cid, ticket.waiter_id);
                Err(ExchangeError::Cancelled)
            }
            result = ticket.rx => result.map_err(|_| ExchangeError::Cancelled),
        }
    }

    /// Drop one waiter's registration without waiting on it. Used by
    /// [`Exchange::wait`]'s cancellation branch; exposed directly for
    /// callers that need to cancel without holding the ticket's future.
    pub fn cancel(&self, cid: &Cid, waiter_id: WaiterId) {
        let now_empty = self
        .wants
        .get_mut(cid)
        .map(|mut entry| entry.cancel_waiter(waiter_id));
        if now_empty == Some(true) {
            self.wants.remove(cid);
        }
    }

    /// `Unwant(cid)`: remove the entry outright. Every
    /// pending waiter observes its sender dropped, which [`Exchange::wait`]
    /// (and any caller awaiting the raw receiver) reports as cancelled.
    pub fn unwant(&self, cid: &Cid) {
        self.wants.remove(cid);
    }

    /// `Found(block)`: if `block.cid` has a Want Entry,
    /// signal every waiter and remove the entry; otherwise a no-op.
    pub fn found(&self, block: Block) {
        if let Some((_, entry)) = self.wants.remove(&block.cid) {
            entry.settle(block);
        }
    }

    /// Broadcast a wantlist update for `cid` to every connected peer,
    /// one fire-and-forget dispatch per peer, bounded by
    /// [`BROADCAST_DEADLINE`] so a handful of unresponsive peers cannot
    /// stall the others.
    async fn broadcast_wantlist(&self, cid: Cid) {
        let peers = self.transport.connected_peers().await;
        let mut tasks = tokio::task::JoinSet::new();
        for peer in peers {
            let transport = Arc::clone(&self.transport);
            tasks.spawn(async move { send_wantlist_update(transport.as_ref(), &peer, cid).await });
        }
        let _ = tokio::time::timeout(BROADCAST_DEADLINE, async {
                while tasks.join_next().await.is_some() {}
            })
        .await;
    }

    /// Process one fully-decoded inbound message from `peer`, received
    /// over `protocol`.
    /// Never raises to the caller: network and protocol errors from a
    /// peer are logged, not propagated.
    pub async fn handle_message(
        &self,
        peer: &PeerId,
        protocol: &str,
        message: ExchangeMessage,
        store: &dyn BlockStore,
    ) {
        if let Some(wantlist) = message.wantlist {
            for entry in wantlist.entries {
                self.handle_wantlist_entry(peer, protocol, entry, store).await;
            }
        }
        for payload in message.payload {
            self.handle_payload_block(peer, payload, store).await;
        }
        for presence in message.block_presences {
            handle_presence(peer, presence);
        }
    }

    async fn handle_wantlist_entry(
        &self,
        peer: &PeerId,
        protocol: &str,
        entry: Entry,
        store: &dyn BlockStore,
    ) {
        let Some(cid_bytes) = entry.block else { return };
        let Ok(cid) = Cid::try_from(cid_bytes.as_slice()) else {
            tracing::debug!(%peer, "bad CID in wantlist entry");
            return;
        };

        if entry.cancel.unwrap_or(false) {
            self.unwant(&cid);
            return;
        }

        let want_type = entry
        .want_type
        .and_then(|t| WantType::try_from(t).ok())
        .unwrap_or(WantType::Block);

        match want_type {
            WantType::Have => {
                let have = store.exists(&cid).await.unwrap_or(false);
                let send_dont_have = entry.send_dont_have.unwrap_or(false);
                if !have && !send_dont_have {
                    return;
                }
                let presence_type = if have {
                    BlockPresenceType::Have
                } else {
                    BlockPresenceType::DontHave
                };
                let message = ExchangeMessage {
                    block_presences: vec![BlockPresence {
                            cid: Some(cid.to_bytes()),
                            presence_type: Some(presence_type as i32),
                        }],
                    ..Default::default()
                };
                let _ = self.transport.send(peer, protocol, message).await;
            }
            WantType::Block => match store.try_get(&cid).await {
                Ok(Some(block)) => {
                    let message = ExchangeMessage {
                        payload: vec![PayloadBlock {
                                prefix: Some(CidPrefix::from_cid(&cid).to_bytes()),
                                data: Some(block.data.to_vec()),
                            }],
                        ..Default::default()
                    };
                    if self.transport.send(peer, protocol, message).await.is_ok() {
                        self.record_sent(peer, block.size() as u64);
                    }
                }
                _ => {
                    tracing::debug!(%cid, %peer, "block requested but not found locally");
                }
            },
        }
    }

    async fn handle_payload_block(&self, peer: &PeerId, payload: PayloadBlock, store: &dyn BlockStore) {
        let (Some(prefix_bytes), Some(data)) = (payload.prefix, payload.data) else {
            return;
        };
        let Ok(prefix) = CidPrefix::from_bytes(&prefix_bytes) else {
            tracing::debug!(%peer, "malformed CID prefix on payload block");
            return;
        };
        let Ok(cid) = prefix.reconstruct(&data) else {
            tracing::debug!(%peer, "could not reconstruct CID from prefix");
            return;
        };
        let block = match Block::new(cid, Bytes::from(data)) {
            Ok(block) => block,
            Err(_) => {
                // Mis-hashed bytes: discard silently, the want stays active.
                tracing::debug!(%cid, %peer, "received block failed to verify, discarding");
                return;
            }
        };
        self.record_received(peer, block.size() as u64);
        if store.put(&block).await.is_ok() {
            self.found(block);
        }
    }

    fn record_sent(&self, peer: &PeerId, bytes: u64) {
        self.ledgers.entry(peer.clone()).or_default().record_sent(bytes);
    }

    fn record_received(&self, peer: &PeerId, bytes: u64) {
        self.ledgers.entry(peer.clone()).or_default().record_received(bytes);
    }
}

/// Try each supported protocol in descending version order, using the
/// first one `peer` accepts.
async fn send_wantlist_update<T: ExchangeTransport + ?Sized>(
    transport: &T,
    peer: &PeerId,
    cid: Cid,
) -> Result<()> {
    let message = ExchangeMessage {
        wantlist: Some(Wantlist {
                entries: vec![Entry {
                        block: Some(cid.to_bytes()),
                        priority: Some(1),
                        cancel: Some(false),
                        want_type: Some(WantType::Block as i32),
                        send_dont_have: Some(true),
                    }],
                full: Some(false),
            }),
        ..Default::default()
    };
    for proto in protocol_table() {
        if transport.send(peer, proto.name, message.clone()).await.is_ok() {
            return Ok(());
        }
    }
    tracing::debug!(%peer, "no common bitswap protocol version, skipping");
    Err(ExchangeError::NoCommonProtocol(peer.clone()))
}

fn protocol_table() -> &'static [ProtocolEntry] {
    protocol::PROTOCOLS
}

fn handle_presence(peer: &PeerId, presence: BlockPresence) {
    let Some(cid_bytes) = presence.cid else { return };
    let Ok(cid) = Cid::try_from(cid_bytes.as_slice()) else {
        return;
    };
    match presence
    .presence_type
    .and_then(|t| BlockPresenceType::try_from(t).ok())
    {
        Some(BlockPresenceType::DontHave) => {
            tracing::debug!(%peer, %cid, "peer reports DONT_HAVE");
        }
        // A HAVE presence may prompt a future block request; not required
        // for correctness so the engine only logs it.
        Some(BlockPresenceType::Have) => {
            tracing::debug!(%peer, %cid, "peer reports HAVE");
        }
        None => {}
    }
}
