//! Local network discovery
//!
//! Finds this host's private IPv4 address and the matching subnet
//! broadcast address by walking the OS interface list. Interfaces that are
//! down or loopback are skipped; the first private IPv4 address wins, so a
//! host on both Ethernet and Wi-Fi uses whichever the OS lists first unless
//! an interface name is given.

use std::net::{Ipv4Addr, SocketAddrV4};

use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;
use tracing::debug;

use crate::error::{Error, Result};

/// A private IPv4 address bound to a network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    /// OS interface name (e.g. `eth0`, `wlan0`)
    pub name: String,
    /// The interface's private IPv4 address
    pub ip: Ipv4Addr,
    /// Subnet mask of that address
    pub netmask: Ipv4Addr,
}

impl LocalInterface {
    /// Broadcast address of the interface's subnet
    pub fn broadcast(&self) -> Ipv4Addr {
        broadcast_address(self.ip, self.netmask)
    }
}

/// Subnet broadcast address: every host bit set
pub fn broadcast_address(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(netmask))
}

/// Find the first up, non-loopback interface carrying a private IPv4 address.
///
/// When `interface` is given only that interface is considered.
pub fn private_ipv4(interface: Option<&str>) -> Result<LocalInterface> {
    let addrs = getifaddrs()
        .map_err(|e| Error::Io(std::io::Error::from(e)))?;

    let candidates = addrs.filter_map(|ifaddr| {
        if !ifaddr.flags.contains(InterfaceFlags::IFF_UP)
            || ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK)
        {
            return None;
        }
        let ip = ifaddr
            .address
            .as_ref()
            .and_then(|a| a.as_sockaddr_in())
            .map(|sin| *SocketAddrV4::from(*sin).ip())?;
        let netmask = ifaddr
            .netmask
            .as_ref()
            .and_then(|a| a.as_sockaddr_in())
            .map(|sin| *SocketAddrV4::from(*sin).ip())?;
        Some(LocalInterface {
            name: ifaddr.interface_name,
            ip,
            netmask,
        })
    });

    let found = select_interface(candidates, interface).ok_or_else(|| Error::NoPrivateInterface {
        interface: interface.map(str::to_string),
    })?;

    debug!(
        interface = %found.name,
        ip = %found.ip,
        broadcast = %found.broadcast(),
        "Private interface selected"
    );
    Ok(found)
}

/// Pick the first candidate with a private address, restricted to `name`
/// when given
fn select_interface(
    candidates: impl IntoIterator<Item = LocalInterface>,
    name: Option<&str>,
) -> Option<LocalInterface> {
    candidates
        .into_iter()
        .filter(|c| name.map_or(true, |n| c.name == n))
        .find(|c| c.ip.is_private())
}
