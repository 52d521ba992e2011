//! The three protocol loops
//!
//! Every loop checks the shutdown signal at the top of each iteration and
//! races its one suspension point against it.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::{handshake, Shared};
use crate::protocol::{Message, MAX_TOKEN_LEN, RECEIVE_ERROR_BACKOFF};
use crate::transport::TransportError;

/// Room for any token plus slack so oversized payloads are seen as such
const RECV_BUFFER_LEN: usize = MAX_TOKEN_LEN + 64;

/// Broadcast DISCOVERY every interval while below capacity
pub(crate) async fn broadcaster(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(shared.config.broadcast_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        if shared.registry.count() >= shared.config.max_peers() {
            trace!("Registry full, skipping discovery broadcast");
            continue;
        }

        match shared.broadcast.send(Message::Discovery.as_bytes()).await {
            Ok(_) => trace!("Discovery broadcast sent"),
            Err(e) => debug!(error = %e, "Discovery broadcast failed"),
        }
    }

    debug!("Broadcaster stopped");
}

/// Answer DISCOVERY broadcasts from new peers
pub(crate) async fn broadcast_responder(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut buf = [0u8; RECV_BUFFER_LEN];

    loop {
        if *shutdown.borrow() {
            break;
        }

        let received = tokio::select! {
            _ = shutdown.changed() => break,
            r = shared.broadcast.recv(&mut buf) => r,
        };

        match received {
            Ok((n, from)) => handshake::on_broadcast(&shared, &buf[..n], from).await,
            Err(e) => {
                if !backoff(&e, &mut shutdown).await {
                    break;
                }
            }
        }
    }

    debug!("Broadcast responder stopped");
}

/// Handle RESPONSE and CONFIRM messages
pub(crate) async fn unicast_listener(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut buf = [0u8; RECV_BUFFER_LEN];

    loop {
        if *shutdown.borrow() {
            break;
        }

        let received = tokio::select! {
            _ = shutdown.changed() => break,
            r = shared.unicast.recv(&mut buf) => r,
        };

        match received {
            Ok((n, from)) => handshake::on_unicast(&shared, &buf[..n], from).await,
            Err(e) => {
                if !backoff(&e, &mut shutdown).await {
                    break;
                }
            }
        }
    }

    debug!("Unicast listener stopped");
}

/// Absorb a receive error. Timeouts continue at once; anything else waits
/// out the back-off. Returns false when shutdown arrived meanwhile.
async fn backoff(err: &TransportError, shutdown: &mut watch::Receiver<bool>) -> bool {
    if err.is_timeout() {
        return true;
    }

    debug!(error = %err, "Receive failed");
    tokio::select! {
        _ = shutdown.changed() => false,
        _ = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => true,
    }
}
