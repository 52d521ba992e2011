//! UDP transports over the host's private interface
//!
//! Both sockets bind the wildcard address so they receive subnet broadcasts
//! as well as datagrams addressed to the interface. The advertised local
//! address is the interface's private IP, which peers see as the sender.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::debug;

use super::{BroadcastTransport, TransportError, TransportResult, UnicastTransport};
use crate::config::NetworkSettings;
use crate::error::{Error, Result};
use crate::net::LocalInterface;

/// Create a nonblocking UDP socket bound to `0.0.0.0:port`
fn make_socket(port: u16, broadcast: bool) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;
    if broadcast {
        socket.set_broadcast(true)?;
    }
    socket.set_nonblocking(true)?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket.bind(&bind_addr.into())?;

    UdpSocket::from_std(socket.into())
}

/// Shared socket slot; `close` empties it
struct SocketSlot {
    socket: RwLock<Option<Arc<UdpSocket>>>,
    read_timeout: Duration,
}

impl SocketSlot {
    fn new(socket: UdpSocket, read_timeout: Duration) -> Self {
        Self {
            socket: RwLock::new(Some(Arc::new(socket))),
            read_timeout,
        }
    }

    fn get(&self) -> TransportResult<Arc<UdpSocket>> {
        self.socket.read().clone().ok_or(TransportError::Closed)
    }

    async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> TransportResult<usize> {
        let socket = self.get()?;
        Ok(socket.send_to(payload, dest).await?)
    }

    async fn recv(&self, buf: &mut [u8]) -> TransportResult<(usize, SocketAddr)> {
        let socket = self.get()?;
        match tokio::time::timeout(self.read_timeout, socket.recv_from(buf)).await {
            Err(_) => Err(TransportError::Timeout),
            Ok(result) => Ok(result?),
        }
    }

    fn close(&self) {
        self.socket.write().take();
    }
}

// ─────────────────────────────────────────────────────────────────
// Broadcast
// ─────────────────────────────────────────────────────────────────

/// Subnet broadcast over UDP
pub struct UdpBroadcastTransport {
    slot: SocketSlot,
    local: SocketAddr,
    target: SocketAddr,
}

impl UdpBroadcastTransport {
    /// Bind the broadcast port on the given interface's subnet
    pub fn bind(iface: &LocalInterface, settings: &NetworkSettings) -> Result<Self> {
        let port = settings.broadcast_port;
        let socket = make_socket(port, true).map_err(|source| Error::Bind {
            what: "broadcast",
            port,
            source,
        })?;

        let target = SocketAddr::new(iface.broadcast().into(), port);
        debug!(port, target = %target, "Broadcast socket bound");

        Ok(Self {
            slot: SocketSlot::new(socket, settings.read_timeout()),
            local: SocketAddr::new(iface.ip.into(), port),
            target,
        })
    }

    /// Destination of every broadcast
    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait]
impl BroadcastTransport for UdpBroadcastTransport {
    fn local_addr(&self) -> SocketAddr {
        self.local
    }

    async fn send(&self, payload: &[u8]) -> TransportResult<usize> {
        self.slot.send_to(payload, self.target).await
    }

    async fn recv(&self, buf: &mut [u8]) -> TransportResult<(usize, SocketAddr)> {
        self.slot.recv(buf).await
    }

    async fn close(&self) {
        self.slot.close();
    }
}

// ─────────────────────────────────────────────────────────────────
// Unicast
// ─────────────────────────────────────────────────────────────────

/// Point-to-point UDP
pub struct UdpUnicastTransport {
    slot: SocketSlot,
    local: SocketAddr,
}

impl UdpUnicastTransport {
    /// Bind the unicast port
    pub fn bind(iface: &LocalInterface, settings: &NetworkSettings) -> Result<Self> {
        let port = settings.unicast_port;
        let socket = make_socket(port, false).map_err(|source| Error::Bind {
            what: "unicast",
            port,
            source,
        })?;
        debug!(port, "Unicast socket bound");

        Ok(Self {
            slot: SocketSlot::new(socket, settings.read_timeout()),
            local: SocketAddr::new(iface.ip.into(), port),
        })
    }
}

#[async_trait]
impl UnicastTransport for UdpUnicastTransport {
    fn local_addr(&self) -> SocketAddr {
        self.local
    }

    async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> TransportResult<usize> {
        self.slot.send_to(payload, dest).await
    }

    async fn recv(&self, buf: &mut [u8]) -> TransportResult<(usize, SocketAddr)> {
        self.slot.recv(buf).await
    }

    async fn close(&self) {
        self.slot.close();
    }
}
