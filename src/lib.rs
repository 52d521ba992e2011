//! Pelotari - zero-configuration LAN peer discovery
//!
//! Nodes on the same subnet find each other by broadcasting a discovery token
//! over UDP and completing a three-way unicast handshake
//! (DISCOVERY, RESPONSE, CONFIRM). Each node keeps a bounded registry of the
//! peers it shook hands with and publishes a fresh membership snapshot after
//! every registration.
//!
//! ```no_run
//! use std::time::Duration;
//! use pelotari::{CommsManager, NetworkSettings, ProtocolConfig};
//!
//! # async fn demo() -> pelotari::Result<()> {
//! let config = ProtocolConfig::new(8, Duration::from_secs(5))?;
//! let manager = CommsManager::udp(config, &NetworkSettings::default())?;
//! let mut membership = manager.subscribe();
//!
//! manager.start().await;
//! while let Some(peers) = membership.next().await {
//!     println!("{} peers", peers.len());
//! }
//! manager.close().await;
//! # Ok(())
//! # }
//! ```

pub mod comms;
pub mod config;
pub mod error;
pub mod logging;
pub mod net;
pub mod peer;
pub mod protocol;
pub mod transport;
pub mod version;

pub use comms::CommsManager;
pub use config::{NetworkSettings, NodeConfig, ProtocolConfig};
pub use error::{Error, ErrorCode, Result};
pub use peer::{MembershipStream, Peer, PeerRegistry, Snapshot};
pub use protocol::Message;
