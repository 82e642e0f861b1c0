//! Resolves interface names the caller gave us into IPv4 addresses to bind
//! discovery sockets to, rejecting interfaces that can't carry broadcast or
//! multicast traffic.

use ipnetwork::IpNetwork;
use pnet::datalink::{self, NetworkInterface};
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("interface {0:?} not found")]
    InterfaceMissing(String),
    #[error("interface {0:?} does not advertise broadcast and multicast capability")]
    InterfaceNotBroadcastMulticast(String),
}

/// Looks up each named interface, verifies it supports broadcast and
/// multicast, and collects its IPv4 addresses in the order the names were
/// given.
pub fn resolve_bind_addresses(interface_names: &[String]) -> Result<Vec<Ipv4Addr>, BindError> {
    let interfaces = datalink::interfaces();
    let mut addresses = Vec::new();

    for name in interface_names {
        let iface = interfaces
            .iter()
            .find(|i| &i.name == name)
            .ok_or_else(|| BindError::InterfaceMissing(name.clone()))?;

        if !is_broadcast_multicast_capable(iface) {
            return Err(BindError::InterfaceNotBroadcastMulticast(name.clone()));
        }

        addresses.extend(ipv4_addresses(&iface.ips));
    }

    Ok(addresses)
}

fn is_broadcast_multicast_capable(iface: &NetworkInterface) -> bool {
    iface.is_broadcast() && iface.is_multicast()
}

fn ipv4_addresses(networks: &[IpNetwork]) -> Vec<Ipv4Addr> {
    networks
        .iter()
        .filter_map(|network| match network.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .collect()
}
