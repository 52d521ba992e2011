//! Handshake rules
//!
//! ```text
//!   discoverer                       responder
//!       |  DISCOVERY (broadcast)         |
//!       |------------------------------->|   skip if sender is self or known
//!       |        RESPONSE (unicast)      |
//!       |<-------------------------------|
//!   register(responder)                  |
//!       |  CONFIRM (unicast)             |
//!       |------------------------------->|
//!       |                        register(discoverer)
//! ```
//!
//! Each function handles exactly one received datagram.

use std::net::{IpAddr, SocketAddr};

use tracing::{debug, info, trace};

use super::Shared;
use crate::error::Error;
use crate::peer::Peer;
use crate::protocol::Message;

/// React to one datagram from the broadcast flow
pub(crate) async fn on_broadcast(shared: &Shared, payload: &[u8], from: SocketAddr) {
    let sender = from.ip();
    if sender == shared.local_ip() {
        trace!("Ignoring own broadcast");
        return;
    }

    if Message::parse(payload) != Some(Message::Discovery) {
        trace!(from = %from, len = payload.len(), "Ignoring non-discovery broadcast");
        return;
    }

    if shared.registry.contains(&sender) {
        trace!(peer = %sender, "Discovery from known peer, not responding");
        return;
    }

    let dest = SocketAddr::new(sender, shared.config.unicast_port());
    match shared
        .unicast
        .send_to(Message::Response.as_bytes(), dest)
        .await
    {
        Ok(_) => debug!(peer = %sender, "Sent response to discovery"),
        Err(e) => debug!(peer = %sender, error = %e, "Failed to send response"),
    }
}

/// React to one datagram from the unicast flow
pub(crate) async fn on_unicast(shared: &Shared, payload: &[u8], from: SocketAddr) {
    let sender = from.ip();
    if sender == shared.local_ip() {
        trace!("Ignoring unicast from self");
        return;
    }

    match Message::parse(payload) {
        Some(Message::Response) => {
            if register(shared, sender, Message::Response) {
                confirm(shared, sender).await;
            }
        }
        Some(Message::Confirm) => {
            register(shared, sender, Message::Confirm);
        }
        Some(msg) => trace!(peer = %sender, message = %msg, "Ignoring unhandled message"),
        None => trace!(from = %from, len = payload.len(), "Ignoring unrecognized payload"),
    }
}

/// Register `ip`; returns whether it is now a member
fn register(shared: &Shared, ip: IpAddr, via: Message) -> bool {
    match shared.registry.register(Peer::new(ip)) {
        Ok(snapshot) => {
            info!(peer = %ip, via = %via, peers = snapshot.len(), "Peer registered");
            true
        }
        Err(Error::CapacityExceeded { max_peers }) => {
            debug!(peer = %ip, max_peers, "Registry full, handshake stalls here");
            false
        }
        Err(e) => {
            debug!(peer = %ip, error = %e, "Registration failed");
            false
        }
    }
}

async fn confirm(shared: &Shared, ip: IpAddr) {
    let dest = SocketAddr::new(ip, shared.config.unicast_port());
    // The peer stays registered even if this send is lost
    match shared
        .unicast
        .send_to(Message::Confirm.as_bytes(), dest)
        .await
    {
        Ok(_) => debug!(peer = %ip, "Sent confirm"),
        Err(e) => debug!(peer = %ip, error = %e, "Failed to send confirm"),
    }
}
