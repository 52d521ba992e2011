//! Communications manager
//!
//! Owns the peer registry and both transports, and drives the discovery
//! protocol with three tasks per run:
//!
//! - **broadcaster**: sends DISCOVERY every interval while below capacity
//! - **broadcast responder**: answers DISCOVERY from unknown peers with RESPONSE
//! - **unicast listener**: registers peers on RESPONSE/CONFIRM
//!
//! A run goes `Idle -> Running -> Idle`. Each run gets a fresh shutdown
//! signal, so the manager can be started again after `stop`.

mod handshake;
mod tasks;

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{NetworkSettings, ProtocolConfig};
use crate::error::Result;
use crate::net;
use crate::peer::{MembershipStream, PeerRegistry, Snapshot};
use crate::transport::{
    BroadcastTransport, UdpBroadcastTransport, UdpUnicastTransport, UnicastTransport,
};

/// State shared by the manager and its tasks
pub(crate) struct Shared {
    pub(crate) config: ProtocolConfig,
    pub(crate) registry: PeerRegistry,
    pub(crate) broadcast: Arc<dyn BroadcastTransport>,
    pub(crate) unicast: Arc<dyn UnicastTransport>,
}

impl Shared {
    pub(crate) fn new(
        config: ProtocolConfig,
        broadcast: impl BroadcastTransport + 'static,
        unicast: impl UnicastTransport + 'static,
    ) -> Self {
        Self {
            registry: PeerRegistry::new(config.max_peers()),
            config,
            broadcast: Arc::new(broadcast),
            unicast: Arc::new(unicast),
        }
    }

    /// This node's identity; packets from it are never acted on
    pub(crate) fn local_ip(&self) -> IpAddr {
        self.broadcast.local_addr().ip()
    }
}

struct RunningTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Runs the discovery protocol and exposes the resulting membership
pub struct CommsManager {
    shared: Arc<Shared>,
    lifecycle: Mutex<Option<RunningTasks>>,
    running: AtomicBool,
    closed: AtomicBool,
}

impl CommsManager {
    /// Build a manager over any pair of transports
    pub fn new(
        config: ProtocolConfig,
        broadcast: impl BroadcastTransport + 'static,
        unicast: impl UnicastTransport + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, broadcast, unicast)),
            lifecycle: Mutex::new(None),
            running: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Build a manager over UDP on the host's private interface.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn udp(config: ProtocolConfig, network: &NetworkSettings) -> Result<Self> {
        let iface = net::private_ipv4(network.interface.as_deref())?;
        let broadcast = UdpBroadcastTransport::bind(&iface, network)?;
        let unicast = UdpUnicastTransport::bind(&iface, network)?;

        info!(
            interface = %iface.name,
            ip = %iface.ip,
            broadcast = %broadcast.target(),
            unicast_port = network.unicast_port,
            "UDP transports ready"
        );

        Ok(Self::new(config, broadcast, unicast))
    }

    /// Spawn the protocol tasks. No-op while running or after `close`.
    pub async fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            return;
        }
        if self.closed.load(Ordering::Acquire) {
            warn!("Start requested on a closed manager");
            return;
        }

        let (shutdown, rx) = watch::channel(false);
        let handles = vec![
            tokio::spawn(tasks::broadcaster(Arc::clone(&self.shared), rx.clone())),
            tokio::spawn(tasks::broadcast_responder(Arc::clone(&self.shared), rx.clone())),
            tokio::spawn(tasks::unicast_listener(Arc::clone(&self.shared), rx)),
        ];

        *lifecycle = Some(RunningTasks { shutdown, handles });
        self.running.store(true, Ordering::Release);

        info!(
            local_ip = %self.local_ip(),
            max_peers = self.shared.config.max_peers(),
            interval_ms = self.shared.config.broadcast_interval().as_millis() as u64,
            "Discovery started"
        );
    }

    /// Signal the tasks and wait until all of them have exited.
    /// No-op when idle.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(run) = lifecycle.take() else {
            return;
        };

        run.shutdown.send_replace(true);
        for handle in run.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Discovery task ended abnormally");
            }
        }

        self.running.store(false, Ordering::Release);
        info!(peers = self.peer_count(), "Discovery stopped");
    }

    /// Stop and release both transports. The manager cannot be restarted.
    pub async fn close(&self) {
        self.stop().await;
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.shared.broadcast.close().await;
            self.shared.unicast.close().await;
        }
    }

    /// Whether the protocol tasks are running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of registered peers
    pub fn peer_count(&self) -> usize {
        self.shared.registry.count()
    }

    /// Whether `ip` is a registered peer
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.shared.registry.contains(ip)
    }

    /// Copy of the current membership, sorted by IP
    pub fn peers(&self) -> Snapshot {
        self.shared.registry.snapshot()
    }

    /// Stream of membership snapshots, one per successful registration
    /// (intermediate ones may be skipped)
    pub fn subscribe(&self) -> MembershipStream {
        self.shared.registry.subscribe()
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.shared.config
    }

    /// IP this node is known by on the network
    pub fn local_ip(&self) -> IpAddr {
        self.shared.local_ip()
    }
}

impl Drop for CommsManager {
    fn drop(&mut self) {
        if let Some(run) = self.lifecycle.get_mut().as_ref() {
            run.shutdown.send_replace(true);
        }
    }
}
