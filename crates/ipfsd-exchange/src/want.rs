//! Want Entry: the engine's record of an in-flight block request.
//!
//! A want entry tracks the CID being requested, the peers known to
//! want it, the waiters to signal once it resolves, and its creation
//! time. Its lifecycle runs `empty -> wanted (1 waiter) -> wanted (n
//! waiters) -> settled | cancelled`.

use ipfsd_block::Block;
use std::time::Instant;
use tokio::sync::oneshot;

/// Opaque peer identifier. The swarm component that assigns these is
/// an external collaborator; the exchange engine only
/// ever needs equality and use as a map key.
pub type PeerId = String;

/// A single waiter's channel: fulfilled with the block once it arrives,
/// dropped (silently, from the waiter's perspective) on cancellation.
pub type Waiter = oneshot::Sender<Block>;

/// Identifies one waiter within a [`WantEntry`] so a specific caller's
/// cancellation can remove just its own registration, without
/// disturbing the others.
pub type WaiterId = u64;

/// The engine's record of one CID's in-flight want.
pub struct WantEntry {
    pub peers: std::collections::HashSet<PeerId>,
    pub waiters: Vec<(WaiterId, Waiter)>,
    pub created_at: Instant,
    next_waiter_id: WaiterId,
}

impl WantEntry {
    pub fn new() -> Self {
        Self {
            peers: std::collections::HashSet::new(),
            waiters: Vec::new(),
            created_at: Instant::now(),
            next_waiter_id: 0,
        }
    }

    /// Register a new waiter, returning the id its owner uses to cancel
    /// it later. Returns whether this was the first waiter — the signal
    /// to broadcast a wantlist update.
    pub fn push_waiter(&mut self, waiter: Waiter) -> (WaiterId, bool) {
        let id = self.next_waiter_id;
        self.next_waiter_id += 1;
        self.waiters.push((id, waiter));
        (id, self.waiters.len() == 1)
    }

    /// Whether this is the first waiter registered — the signal to
    /// broadcast a wantlist update.
    pub fn is_first_waiter(&self) -> bool {
        self.waiters.len() == 1
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Drop the waiter registered under `id`. Returns whether the entry
    /// is now waiterless (the caller should remove it from the `wants`
    /// map, per its "non-empty waiters" invariant).
    pub fn cancel_waiter(&mut self, id: WaiterId) -> bool {
        self.waiters.retain(|(wid, _)| *wid != id);
        self.waiters.is_empty()
    }

    /// Deliver `block` to every waiter, consuming them. A waiter whose
    /// receiver has already been dropped (cancelled) is simply skipped.
    pub fn settle(self, block: Block) {
        for (_, waiter) in self.waiters {
            let _ = waiter.send(block.clone());
        }
    }
}

impl Default for WantEntry {
    fn default() -> Self {
        Self::new()
    }
}
