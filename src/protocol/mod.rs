//! Discovery protocol definitions
//!
//! Fixed ports, timing constants and the token vocabulary exchanged by
//! peers. Two independent UDP flows are used: a broadcast flow for
//! discovery and a unicast flow for the rest of the handshake.

use std::time::Duration;

mod messages;

pub use messages::*;

/// UDP port of the broadcast (discovery) flow
pub const BROADCAST_PORT: u16 = 21451;

/// UDP port of the unicast (handshake) flow
pub const UNICAST_PORT: u16 = 21450;

/// Upper bound on a single blocking transport read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Pause after a non-timeout receive error before reading again
pub const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Default number of peers a node accepts
pub const DEFAULT_MAX_PEERS: usize = 64;

/// Default time between discovery broadcasts
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(5);
