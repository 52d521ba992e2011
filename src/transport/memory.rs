//! In-memory transports for network-free protocol tests
//!
//! A [`MemoryNetwork`] is a tiny simulated LAN. Each joined node gets a
//! broadcast endpoint and a unicast endpoint backed by channels. Broadcasts
//! reach every joined node including the sender, exactly like a real subnet
//! broadcast, so self-filtering is exercised. Every datagram a node sends is
//! recorded and can be inspected with [`MemoryNetwork::sent`].

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use super::{BroadcastTransport, TransportError, TransportResult, UnicastTransport};
use crate::protocol::{Message, BROADCAST_PORT, UNICAST_PORT};

const DEFAULT_MEMORY_READ_TIMEOUT: Duration = Duration::from_millis(20);

type Inbox = mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>;

/// A datagram observed on the simulated network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Sender's local address on the flow it used
    pub from: SocketAddr,
    /// Destination (the broadcast address for broadcasts)
    pub to: SocketAddr,
    /// Raw payload
    pub payload: Vec<u8>,
    /// Whether the datagram used the unicast flow
    pub unicast: bool,
}

impl Datagram {
    /// Whether the payload is exactly the given protocol message
    pub fn is(&self, msg: Message) -> bool {
        self.payload == msg.as_bytes()
    }
}

struct NodeInboxes {
    broadcast: Inbox,
    unicast: Inbox,
    unicast_port: u16,
}

struct NetworkInner {
    read_timeout: Duration,
    nodes: Mutex<HashMap<IpAddr, NodeInboxes>>,
    muted: Mutex<HashSet<IpAddr>>,
    sent: Mutex<Vec<Datagram>>,
}

impl NetworkInner {
    fn deliver_broadcast(&self, payload: &[u8], from: SocketAddr) {
        for inboxes in self.nodes.lock().values() {
            let _ = inboxes.broadcast.send((payload.to_vec(), from));
        }
    }

    fn deliver_unicast(&self, payload: &[u8], from: SocketAddr, dest: SocketAddr) {
        match self.nodes.lock().get(&dest.ip()) {
            Some(inboxes) if inboxes.unicast_port == dest.port() => {
                let _ = inboxes.unicast.send((payload.to_vec(), from));
            }
            _ => trace!(dest = %dest, "memory network dropping datagram to unknown port"),
        }
    }
}

/// A simulated broadcast domain
#[derive(Clone)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

impl MemoryNetwork {
    /// Create an empty network with a short read timeout
    pub fn new() -> Self {
        Self::with_read_timeout(DEFAULT_MEMORY_READ_TIMEOUT)
    }

    /// Create an empty network whose reads time out after `read_timeout`
    pub fn with_read_timeout(read_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                read_timeout,
                nodes: Mutex::new(HashMap::new()),
                muted: Mutex::new(HashSet::new()),
                sent: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Attach a node with the given IP and hand back its two endpoints.
    /// Joining again with the same IP replaces the previous endpoints.
    pub fn join(&self, ip: IpAddr) -> (MemoryBroadcast, MemoryUnicast) {
        self.join_with_unicast_port(ip, UNICAST_PORT)
    }

    /// Like [`join`](Self::join), with the node listening for unicast on
    /// `unicast_port`
    pub fn join_with_unicast_port(
        &self,
        ip: IpAddr,
        unicast_port: u16,
    ) -> (MemoryBroadcast, MemoryUnicast) {
        let (btx, brx) = mpsc::unbounded_channel();
        let (utx, urx) = mpsc::unbounded_channel();

        self.inner.nodes.lock().insert(
            ip,
            NodeInboxes {
                broadcast: btx,
                unicast: utx,
                unicast_port,
            },
        );

        let broadcast = MemoryBroadcast {
            local: SocketAddr::new(ip, BROADCAST_PORT),
            network: Arc::clone(&self.inner),
            inbox: tokio::sync::Mutex::new(brx),
            closed: AtomicBool::new(false),
        };
        let unicast = MemoryUnicast {
            local: SocketAddr::new(ip, unicast_port),
            network: Arc::clone(&self.inner),
            inbox: tokio::sync::Mutex::new(urx),
            closed: AtomicBool::new(false),
        };
        (broadcast, unicast)
    }

    /// Drop every broadcast sent by `ip` from now on. The sends still
    /// succeed and are still recorded. Used to make discovery one-directional.
    pub fn mute_broadcasts(&self, ip: IpAddr) {
        self.inner.muted.lock().insert(ip);
    }

    /// Deliver a broadcast datagram as if `from` had sent it, without
    /// recording it
    pub fn inject_broadcast(&self, payload: &[u8], from: SocketAddr) {
        self.inner.deliver_broadcast(payload, from);
    }

    /// Deliver a unicast datagram as if `from` had sent it, without
    /// recording it
    pub fn inject_unicast(&self, payload: &[u8], from: SocketAddr, dest: SocketAddr) {
        self.inner.deliver_unicast(payload, from, dest);
    }

    /// Every datagram sent by a joined node, in send order
    pub fn sent(&self) -> Vec<Datagram> {
        self.inner.sent.lock().clone()
    }

    /// Number of times `msg` was sent from `from_ip`
    pub fn count_sent(&self, msg: Message, from_ip: IpAddr) -> usize {
        self.inner
            .sent
            .lock()
            .iter()
            .filter(|d| d.from.ip() == from_ip && d.is(msg))
            .count()
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

async fn recv_from_inbox(
    inbox: &tokio::sync::Mutex<mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>>,
    read_timeout: Duration,
    buf: &mut [u8],
) -> TransportResult<(usize, SocketAddr)> {
    let mut inbox = inbox.lock().await;
    match tokio::time::timeout(read_timeout, inbox.recv()).await {
        Err(_) => Err(TransportError::Timeout),
        Ok(None) => Err(TransportError::Closed),
        Ok(Some((payload, from))) => {
            let n = payload.len().min(buf.len());
            buf[..n].copy_from_slice(&payload[..n]);
            Ok((n, from))
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Endpoints
// ─────────────────────────────────────────────────────────────────

/// Broadcast endpoint of a node on a [`MemoryNetwork`]
pub struct MemoryBroadcast {
    local: SocketAddr,
    network: Arc<NetworkInner>,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>>,
    closed: AtomicBool,
}

#[async_trait]
impl BroadcastTransport for MemoryBroadcast {
    fn local_addr(&self) -> SocketAddr {
        self.local
    }

    async fn send(&self, payload: &[u8]) -> TransportResult<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        self.network.sent.lock().push(Datagram {
            from: self.local,
            to: SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), BROADCAST_PORT),
            payload: payload.to_vec(),
            unicast: false,
        });

        if !self.network.muted.lock().contains(&self.local.ip()) {
            self.network.deliver_broadcast(payload, self.local);
        }
        Ok(payload.len())
    }

    async fn recv(&self, buf: &mut [u8]) -> TransportResult<(usize, SocketAddr)> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        recv_from_inbox(&self.inbox, self.network.read_timeout, buf).await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Unicast endpoint of a node on a [`MemoryNetwork`]
pub struct MemoryUnicast {
    local: SocketAddr,
    network: Arc<NetworkInner>,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>>,
    closed: AtomicBool,
}

#[async_trait]
impl UnicastTransport for MemoryUnicast {
    fn local_addr(&self) -> SocketAddr {
        self.local
    }

    async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> TransportResult<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        self.network.sent.lock().push(Datagram {
            from: self.local,
            to: dest,
            payload: payload.to_vec(),
            unicast: true,
        });
        self.network.deliver_unicast(payload, self.local, dest);
        Ok(payload.len())
    }

    async fn recv(&self, buf: &mut [u8]) -> TransportResult<(usize, SocketAddr)> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        recv_from_inbox(&self.inbox, self.network.read_timeout, buf).await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
