//! Transport capability traits
//!
//! The protocol core never touches sockets directly. It talks to a
//! broadcast transport and a unicast transport through these traits, so the
//! production UDP implementations in [`udp`] and the in-memory network in
//! [`memory`] are interchangeable.
//!
//! Contract shared by both transports:
//! - `recv` blocks for at most an implementation-defined timeout and then
//!   returns [`TransportError::Timeout`]. A timeout is a "nothing arrived"
//!   signal, not a failure.
//! - `send`/`send_to` may be called concurrently from several tasks.
//! - `close` is idempotent; afterwards every operation fails with
//!   [`TransportError::Closed`].

use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod udp;

pub use memory::{Datagram, MemoryBroadcast, MemoryNetwork, MemoryUnicast};
pub use udp::{UdpBroadcastTransport, UdpUnicastTransport};

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors raised by a transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// Nothing arrived within the read timeout
    #[error("read timed out")]
    Timeout,

    /// The transport has been closed
    #[error("transport closed")]
    Closed,

    /// Underlying socket error
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this is the expected "nothing arrived this tick" signal
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Timeout => true,
            TransportError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            TransportError::Closed => false,
        }
    }
}

/// Sends to and receives from the subnet broadcast address
#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    /// Local address of this node on the broadcast flow. Its IP is the
    /// node's own identity for self-filtering.
    fn local_addr(&self) -> SocketAddr;

    /// Broadcast a payload to the local network. Returns the number of
    /// bytes sent.
    async fn send(&self, payload: &[u8]) -> TransportResult<usize>;

    /// Receive one broadcast datagram into `buf`, returning its length and
    /// the sender address.
    async fn recv(&self, buf: &mut [u8]) -> TransportResult<(usize, SocketAddr)>;

    /// Release the underlying resources
    async fn close(&self);
}

/// Sends to and receives from individual peers
#[async_trait]
pub trait UnicastTransport: Send + Sync {
    /// Local address of this node on the unicast flow
    fn local_addr(&self) -> SocketAddr;

    /// Send a payload to one peer. Returns the number of bytes sent.
    async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> TransportResult<usize>;

    /// Receive one unicast datagram into `buf`, returning its length and
    /// the sender address.
    async fn recv(&self, buf: &mut [u8]) -> TransportResult<(usize, SocketAddr)>;

    /// Release the underlying resources
    async fn close(&self);
}
