//! Membership snapshot publication
//!
//! A single-slot overwrite mailbox built on `tokio::sync::watch`. Publishing
//! never blocks and replaces any snapshot nobody has read yet, so a slow
//! consumer sees the newest membership and skips the ones in between.

use std::sync::Arc;

use tokio::sync::watch;

use super::Peer;

/// Immutable point-in-time copy of the registry, sorted by IP
pub type Snapshot = Arc<[Peer]>;

/// Write side of the membership mailbox
#[derive(Debug)]
pub struct MembershipPublisher {
    tx: watch::Sender<Snapshot>,
}

impl MembershipPublisher {
    /// Create a publisher holding an empty snapshot
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Snapshot::from(Vec::new()));
        Self { tx }
    }

    /// Replace the current snapshot. Works with or without subscribers.
    pub fn publish(&self, snapshot: Snapshot) {
        self.tx.send_replace(snapshot);
    }

    /// Open a new stream. The snapshot current at subscription time counts
    /// as already read.
    pub fn subscribe(&self) -> MembershipStream {
        MembershipStream {
            rx: self.tx.subscribe(),
        }
    }

    /// The most recently published snapshot
    pub fn latest(&self) -> Snapshot {
        self.tx.borrow().clone()
    }
}

impl Default for MembershipPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of the membership mailbox
#[derive(Debug, Clone)]
pub struct MembershipStream {
    rx: watch::Receiver<Snapshot>,
}

impl MembershipStream {
    /// Wait for a snapshot newer than the last one read. Returns `None`
    /// once the publisher is gone.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Take an unread snapshot if one is pending
    pub fn try_next(&mut self) -> Option<Snapshot> {
        match self.rx.has_changed() {
            Ok(true) => Some(self.rx.borrow_and_update().clone()),
            _ => None,
        }
    }

    /// The newest snapshot, read or not
    pub fn latest(&self) -> Snapshot {
        self.rx.borrow().clone()
    }
}
