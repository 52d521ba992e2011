//! Peer registry, the bounded set of peers this node has shaken hands with
//!
//! Keyed by IP address. Every successful registration publishes a fresh
//! snapshot while the write lock is still held, so snapshots are produced in
//! registration order and never shrink.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::membership::{MembershipPublisher, MembershipStream, Snapshot};
use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Peer
// ─────────────────────────────────────────────────────────────────

/// A registered peer. Two peers are equal when their IPs are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    /// Peer identity
    pub ip: IpAddr,

    /// When the peer was first registered
    pub first_seen: DateTime<Utc>,

    /// When the peer was last registered
    pub last_seen: DateTime<Utc>,

    /// Unanswered heartbeats (reserved for liveness checks)
    pub missed_heartbeats: u32,
}

impl Peer {
    /// A peer seen for the first time now
    pub fn new(ip: IpAddr) -> Self {
        let now = Utc::now();
        Self {
            ip,
            first_seen: now,
            last_seen: now,
            missed_heartbeats: 0,
        }
    }

    /// Socket address of the peer on `port`
    pub fn address(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.ip, port)
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.ip == other.ip
    }
}

impl Eq for Peer {}

// ─────────────────────────────────────────────────────────────────
// Peer Registry
// ─────────────────────────────────────────────────────────────────

/// Thread-safe registry bounded by `max_peers`
#[derive(Debug)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<IpAddr, Peer>>,
    max_peers: usize,
    publisher: MembershipPublisher,
}

impl PeerRegistry {
    /// Create an empty registry
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            max_peers,
            publisher: MembershipPublisher::new(),
        }
    }

    /// Register or refresh a peer and publish the new membership.
    ///
    /// Fails with `CapacityExceeded` without touching the map when the
    /// registry already holds `max_peers` entries, even if `peer` is one of
    /// them.
    pub fn register(&self, peer: Peer) -> Result<Snapshot> {
        let mut peers = self.peers.write();
        if peers.len() >= self.max_peers {
            return Err(Error::capacity_exceeded(self.max_peers));
        }

        match peers.get_mut(&peer.ip) {
            Some(existing) => {
                existing.last_seen = peer.last_seen;
                existing.missed_heartbeats = peer.missed_heartbeats;
            }
            None => {
                peers.insert(peer.ip, peer);
            }
        }

        let snapshot = build_snapshot(&peers);
        self.publisher.publish(Snapshot::clone(&snapshot));
        Ok(snapshot)
    }

    /// Number of registered peers
    pub fn count(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether `ip` is registered
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.peers.read().contains_key(ip)
    }

    /// Copy of the current membership
    pub fn snapshot(&self) -> Snapshot {
        build_snapshot(&self.peers.read())
    }

    /// Capacity bound
    pub fn max_peers(&self) -> usize {
        self.max_peers
    }

    /// Subscribe to membership changes
    pub fn subscribe(&self) -> MembershipStream {
        self.publisher.subscribe()
    }
}

fn build_snapshot(peers: &HashMap<IpAddr, Peer>) -> Snapshot {
    let mut list: Vec<Peer> = peers.values().cloned().collect();
    list.sort_by_key(|p| p.ip);
    list.into()
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
