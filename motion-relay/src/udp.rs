//! UDP change sink
//!
//! One datagram per debounced change, `<tag-id>,<1|0>\n`. Fire and forget:
//! send failures are logged and dropped.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use motion_common::TagChange;
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, warn};

use crate::error::Result;

/// Best-effort datagram sender for tag changes
pub struct UdpNotifier {
    socket: UdpSocket,
    destination: String,
}

impl UdpNotifier {
    /// Bind an ephemeral local socket for sending to `destination` (`host:port`)
    ///
    /// The socket takes the address family of the first resolved destination
    /// address. An unresolvable destination still binds (IPv4) so sends can
    /// fail and be logged per change.
    pub async fn bind(destination: impl Into<String>) -> Result<Self> {
        let destination = destination.into();
        let resolved = match lookup_host(destination.as_str()).await {
            Ok(mut addrs) => addrs.next(),
            Err(e) => {
                warn!("Cannot resolve UDP destination {}: {}", destination, e);
                None
            }
        };
        let socket = UdpSocket::bind(local_bind_addr(resolved)).await?;
        Ok(Self { socket, destination })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Send one change; returns whether the datagram left the socket
    pub async fn notify(&self, change: &TagChange) -> bool {
        let line = change.to_line();
        match self.socket.send_to(line.as_bytes(), self.destination.as_str()).await {
            Ok(_) => {
                debug!("UDP {} -> {}", line.trim_end(), self.destination);
                true
            }
            Err(e) => {
                warn!("Failed to send UDP notification to {}: {}", self.destination, e);
                false
            }
        }
    }
}

/// Wildcard address of the same family as `destination`
fn local_bind_addr(destination: Option<SocketAddr>) -> SocketAddr {
    match destination {
        Some(SocketAddr::V6(_)) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        _ => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
    }
}
