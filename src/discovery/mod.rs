//! LAN host discovery over UDP broadcast
//!
//! The host repeats `GAME_HOST_AT:<ip>` until a listener answers with
//! `GAME_HOST_ACK`. The listener takes the first valid announcement.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const ANNOUNCE_PREFIX: &str = "GAME_HOST_AT:";
pub const ACK: &str = "GAME_HOST_ACK";
pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(2);

/// Discovery errors
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Discovery socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Announcement payload for `ip`
pub fn announcement(ip: IpAddr) -> String {
    format!("{}{}", ANNOUNCE_PREFIX, ip)
}

/// Parse an announcement; anything else on the port is ignored
pub fn parse_announcement(payload: &str) -> Option<IpAddr> {
    payload
        .trim()
        .strip_prefix(ANNOUNCE_PREFIX)
        .and_then(|ip| ip.trim().parse().ok())
}

/// First private IPv4 address of this host, or loopback
pub fn local_ipv4() -> IpAddr {
    // Connecting a UDP socket sends nothing; it only selects the outbound
    // interface.
    let probed = StdUdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((Ipv4Addr::new(10, 254, 254, 254), 1))?;
            socket.local_addr()
        })
        .ok()
        .map(|addr| addr.ip());

    match probed {
        Some(IpAddr::V4(ip)) if is_private(ip) => IpAddr::V4(ip),
        _ => IpAddr::V4(Ipv4Addr::LOCALHOST),
    }
}

fn is_private(ip: Ipv4Addr) -> bool {
    matches!(ip.octets()[0], 10 | 172 | 192)
}

/// Broadcast `ip` on `port` every [`ANNOUNCE_INTERVAL`] until acknowledged
pub async fn announce(port: u16, ip: IpAddr) -> Result<(), DiscoveryError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;
    let target = SocketAddr::from((Ipv4Addr::BROADCAST, port));
    let payload = announcement(ip);

    info!(%ip, port, "Announcing host on LAN");

    let mut ticker = interval(ANNOUNCE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buf = [0u8; 256];

    loop {
        ticker.tick().await;
        if let Err(e) = socket.send_to(payload.as_bytes(), target).await {
            warn!(error = %e, "Announcement failed");
            continue;
        }

        // Listen for an ack until the next announcement is due
        if let Ok(Ok((len, from))) = timeout(ANNOUNCE_INTERVAL, socket.recv_from(&mut buf)).await {
            if String::from_utf8_lossy(&buf[..len]).trim() == ACK {
                info!(%from, "Host announcement acknowledged");
                return Ok(());
            }
        }
    }
}

/// Wait on `port` for the first host announcement and acknowledge it
pub async fn discover(port: u16) -> Result<IpAddr, DiscoveryError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
    info!(port, "Listening for host announcements");

    let mut buf = [0u8; 256];
    loop {
        let (len, from) = socket.recv_from(&mut buf).await?;
        let payload = String::from_utf8_lossy(&buf[..len]);
        match parse_announcement(&payload) {
            Some(ip) => {
                socket.send_to(ACK.as_bytes(), from).await?;
                info!(%ip, %from, "Discovered host");
                return Ok(ip);
            }
            None => debug!(%from, "Ignoring datagram on discovery port"),
        }
    }
}
