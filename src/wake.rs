//! Wake-on-LAN sender
//!
//! Used for power-on when a MAC address is configured. A fully powered-off
//! TV does not answer the control protocol, so the magic packet is the only
//! way to bring it up.

use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, info, warn};
use viera_shared::wol;

/// Sends an out-of-band wake signal to a device
#[async_trait]
pub trait WakeSender: Send + Sync {
    /// Returns true if at least one packet left the host
    async fn wake(&self, mac: &str, host: &str) -> bool;
}

/// A single destination for the magic packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeTarget {
    Broadcast(u16),
    Unicast(String, u16),
}

/// Wake sender over a UDP socket
#[derive(Debug, Clone)]
pub struct UdpWakeSender {
    broadcast_ports: Vec<u16>,
    unicast_port: u16,
}

impl Default for UdpWakeSender {
    fn default() -> Self {
        Self::with_ports(wol::BROADCAST_PORTS.to_vec(), wol::UNICAST_PORT)
    }
}

impl UdpWakeSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ports(broadcast_ports: Vec<u16>, unicast_port: u16) -> Self {
        Self {
            broadcast_ports,
            unicast_port,
        }
    }

    /// Destinations in send order: each broadcast port, then the device itself
    pub fn targets(&self, host: &str) -> Vec<WakeTarget> {
        let mut targets: Vec<WakeTarget> = self
            .broadcast_ports
            .iter()
            .map(|port| WakeTarget::Broadcast(*port))
            .collect();
        if !host.is_empty() {
            targets.push(WakeTarget::Unicast(host.to_string(), self.unicast_port));
        }
        targets
    }

    async fn resolve(target: &WakeTarget) -> std::io::Result<SocketAddr> {
        match target {
            WakeTarget::Broadcast(port) => Ok(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::BROADCAST,
                *port,
            ))),
            WakeTarget::Unicast(host, port) => lookup_host((host.as_str(), *port))
                .await?
                .find(SocketAddr::is_ipv4)
                .ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no IPv4 address for host")
                }),
        }
    }
}

#[async_trait]
impl WakeSender for UdpWakeSender {
    async fn wake(&self, mac: &str, host: &str) -> bool {
        let packet = match wol::encode(mac) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("[WOL] Invalid MAC address {:?}: {}", mac, e);
                return false;
            }
        };

        let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("[WOL] Failed to open UDP socket: {}", e);
                return false;
            }
        };
        if let Err(e) = socket.set_broadcast(true) {
            warn!("[WOL] Failed to enable broadcast: {}", e);
        }

        let mut sent = 0;
        for target in self.targets(host) {
            let result = match Self::resolve(&target).await {
                Ok(addr) => socket.send_to(&packet, addr).await.map(|_| addr),
                Err(e) => Err(e),
            };

            match result {
                Ok(addr) => {
                    debug!("[WOL] Magic packet sent to {}", addr);
                    sent += 1;
                }
                Err(e) => warn!("[WOL] Send to {:?} failed: {}", target, e),
            }
        }

        if sent > 0 {
            info!("[WOL] Wake packet for {} sent ({} destinations)", mac, sent);
        }
        sent > 0
    }
}
