//! Per-peer accounting ledger.
//!
//! "Peer Ledger" data model: {blocks-exchanged, bytes-sent,
//! bytes-received, indebtedness}. Held one-per-peer in the engine's
//! `ledgers` map; each ledger's own counters are updated from inside a
//! short `DashMap` entry critical section, never across a suspension
//! point.

/// Accounting counters for one remote peer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeerLedger {
    pub blocks_exchanged: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl PeerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a block sent to this peer.
    pub fn record_sent(&mut self, bytes: u64) {
        self.blocks_exchanged += 1;
        self.bytes_sent += bytes;
    }

    /// Record a block received from this peer.
    pub fn record_received(&mut self, bytes: u64) {
        self.blocks_exchanged += 1;
        self.bytes_received += bytes;
    }

    /// Bytes sent minus bytes received: positive means this peer owes
    /// us, by the simplest possible accounting policy (no decay, no
    /// weighting). The exchange engine does not act on this value on
    /// its own; it is exposed for a future incentive layer to consume.
    pub fn indebtedness(&self) -> i64 {
        self.bytes_sent as i64 - self.bytes_received as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ledger_is_zeroed() {
        let ledger = PeerLedger::new();
        assert_eq!(ledger.blocks_exchanged, 0);
        assert_eq!(ledger.indebtedness(), 0);
    }

    #[test]
    fn sends_and_receives_accumulate_independently() {
        let mut ledger = PeerLedger::new();
        ledger.record_sent(100);
        ledger.record_received(40);
        assert_eq!(ledger.blocks_exchanged, 2);
        assert_eq!(ledger.bytes_sent, 100);
        assert_eq!(ledger.bytes_received, 40);
        assert_eq!(ledger.indebtedness(), 60);
    }
}
