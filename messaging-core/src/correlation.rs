//! Request/response correlation (§3 "Correlation table", §9 design note).
//!
//! A single mutex-guarded hash map keyed by request id. The design note in
//! spec.md explicitly prefers this over a sharded or lock-free scheme: the
//! contention window is one insert, one read on delivery, one delete, and
//! code clarity matters more here than squeezing out lock contention,
//! because the insert-before-publish ordering is a correctness invariant,
//! not an optimization.

use std::collections::HashMap;
use std::sync::Mutex;

use messaging_wire::Packet;
use tokio::sync::oneshot;

#[derive(Default)]
pub struct CorrelationTable {
    inner: Mutex<HashMap<u64, oneshot::Sender<Packet>>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        CorrelationTable::default()
    }

    /// Creates a rendezvous cell for `id`. Must be called and its result
    /// retained *before* the corresponding request is published — this
    /// ordering is load-bearing: publishing first risks a response arriving
    /// (and finding no entry to deliver to) before the insert lands.
    pub fn insert(&self, id: u64) -> oneshot::Receiver<Packet> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().unwrap().insert(id, tx);
        rx
    }

    /// Removes the entry for `id` without delivering anything — used on
    /// timeout (before a retry) and on publish failure.
    pub fn remove(&self, id: u64) {
        self.inner.lock().unwrap().remove(&id);
    }

    /// Delivers a response to its waiting caller, removing the entry.
    /// Returns `false` if there was no entry (a late/duplicate/unsolicited
    /// response), which the caller should simply drop.
    pub fn deliver(&self, id: u64, packet: Packet) -> bool {
        let sender = self.inner.lock().unwrap().remove(&id);
        match sender {
            Some(sender) => sender.send(packet).is_ok(),
            None => false,
        }
    }

    /// Drops every outstanding entry, causing every in-flight `Req` to
    /// observe a closed channel rather than hang forever (used by `Stop`).
    pub fn cancel_all(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging_wire::{LogHeader, LogLevel};

    fn dummy_packet() -> Packet {
        Packet::Log {
            header: LogHeader {
                id: 1,
                from: "x".into(),
                level: LogLevel::Debug,
                log_time: "now".into(),
            },
            content: "hi".into(),
        }
    }

    #[tokio::test]
    async fn delivers_to_the_matching_entry() {
        let table = CorrelationTable::new();
        let rx = table.insert(1);
        assert!(table.deliver(1, dummy_packet()));
        assert!(rx.await.is_ok());
        assert!(table.is_empty());
    }

    #[test]
    fn deliver_without_entry_is_a_noop() {
        let table = CorrelationTable::new();
        assert!(!table.deliver(99, dummy_packet()));
    }

    #[tokio::test]
    async fn cancel_all_closes_every_pending_receiver() {
        let table = CorrelationTable::new();
        let rx1 = table.insert(1);
        let rx2 = table.insert(2);
        table.cancel_all();
        assert!(rx1.await.is_err());
        assert!(rx2.await.is_err());
    }
}
