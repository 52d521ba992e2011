//! Peer membership
//!
//! The registry holds every peer this node completed a handshake with and
//! publishes a snapshot of that set after each successful registration.

pub mod membership;
pub mod registry;

pub use membership::{MembershipPublisher, MembershipStream, Snapshot};
pub use registry::{Peer, PeerRegistry};
