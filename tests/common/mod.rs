//! Shared helpers for protocol scenarios over the in-memory network

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use pelotari::protocol::{Message, BROADCAST_PORT, UNICAST_PORT};
use pelotari::transport::MemoryNetwork;
use pelotari::{CommsManager, ProtocolConfig};

/// Broadcast interval used by scenario nodes
pub const INTERVAL: Duration = Duration::from_millis(25);

/// Upper bound for any scenario to converge
pub const SETTLE: Duration = Duration::from_secs(3);

pub fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 50, last))
}

pub fn unicast_addr(last: u8) -> SocketAddr {
    SocketAddr::new(ip(last), UNICAST_PORT)
}

pub fn broadcast_addr(last: u8) -> SocketAddr {
    SocketAddr::new(ip(last), BROADCAST_PORT)
}

/// Join a node to `net` with the given capacity
pub fn node(net: &MemoryNetwork, last: u8, max_peers: usize) -> CommsManager {
    let (bc, uc) = net.join(ip(last));
    let config = ProtocolConfig::new(max_peers, INTERVAL).unwrap();
    CommsManager::new(config, bc, uc)
}

/// Poll `cond` until it holds or `SETTLE` passes
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + SETTLE;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

/// Index of the first datagram carrying `msg` sent from `from`
pub fn first_sent(net: &MemoryNetwork, msg: Message, from: IpAddr) -> Option<usize> {
    net.sent()
        .iter()
        .position(|d| d.from.ip() == from && d.is(msg))
}
