//! UDP broadcast discovery of the SQM-LE.
//!
//! The device's ethernet bridge answers a fixed 4-byte probe broadcast on a
//! well-known port. Its reply carries the hardware address in a fixed byte
//! range; the device's network address is the datagram's sender. The
//! follow-up TCP session always uses the fixed session port, never anything
//! learned from the reply.
//!
//! The device may ignore or delay its first replies, so discovery polls
//! with a receive timeout and a fixed backoff instead of blocking on a
//! single receive.

use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use tokio::net::UdpSocket;

use sqm_core::{retry_for, AppResult, SqmError};

/// Well-known discovery port the probe is broadcast to.
pub const DISCOVERY_PORT: u16 = 30718;

/// Fixed TCP port the follow-up session uses.
pub const SESSION_PORT: u16 = 10001;

/// The 4-byte discovery probe.
const PROBE: [u8; 4] = [0x00, 0x00, 0x00, 0xf6];

/// A reply is accepted when its fourth byte equals this marker.
const REPLY_MARKER: u8 = 0xf7;

/// Hardware address starts at this offset of an accepted reply.
const MAC_OFFSET: usize = 24;

/// How long a single receive waits before the backoff kicks in.
const RECV_WINDOW: Duration = Duration::from_secs(1);

/// Backoff between receive attempts.
const RECV_BACKOFF: Duration = Duration::from_secs(1);

/// Discovery settings. Defaults target the real device wire values; tests
/// point the probe at a loopback simulator instead.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Address the probe is sent to.
    #[serde(default = "default_broadcast_addr")]
    pub broadcast_addr: String,

    /// Discovery port.
    #[serde(default = "default_discovery_port")]
    pub port: u16,

    /// Overall discovery timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_broadcast_addr() -> String {
    "255.255.255.255".to_string()
}

fn default_discovery_port() -> u16 {
    DISCOVERY_PORT
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: default_broadcast_addr(),
            port: default_discovery_port(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// What discovery learns about the device before the first session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Network address the session will be established against.
    pub addr: IpAddr,
    /// Hardware address, colon-hex.
    pub mac: String,
}

/// Broadcast the probe and poll for a matching reply.
///
/// Returns [`SqmError::NotFound`] when the timeout elapses without one.
pub async fn discover(config: &DiscoveryConfig) -> AppResult<DiscoveredDevice> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;

    let target = (config.broadcast_addr.as_str(), config.port);
    socket.send_to(&PROBE, target).await?;
    tracing::info!(
        addr = %config.broadcast_addr,
        port = config.port,
        "discovery probe sent"
    );

    let timeout = Duration::from_secs(config.timeout_secs);
    let device = retry_for(timeout, RECV_BACKOFF, || receive_reply(&socket))
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "discovery exhausted its timeout");
            SqmError::NotFound {
                timeout_secs: config.timeout_secs,
            }
        })?;

    tracing::info!(addr = %device.addr, mac = %device.mac, "device located");
    Ok(device)
}

/// One receive attempt: wait briefly for a datagram and validate it.
async fn receive_reply(socket: &UdpSocket) -> AppResult<DiscoveredDevice> {
    let mut buf = [0u8; 128];
    let (len, peer) = tokio::time::timeout(RECV_WINDOW, socket.recv_from(&mut buf))
        .await
        .map_err(|_| SqmError::Protocol("no discovery reply yet".to_string()))??;

    if len < 4 || buf[3] != REPLY_MARKER {
        return Err(SqmError::Protocol(format!(
            "unexpected datagram ({len} bytes) from {peer}"
        )));
    }
    if len <= MAC_OFFSET {
        return Err(SqmError::Protocol(format!(
            "reply from {peer} too short to carry a hardware address ({len} bytes)"
        )));
    }

    let mac = buf[MAC_OFFSET..len]
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(":");

    Ok(DiscoveredDevice {
        addr: peer.ip(),
        mac,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_wire_values() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.broadcast_addr, "255.255.255.255");
        assert_eq!(config.port, 30718);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn probe_bytes() {
        assert_eq!(PROBE, [0x00, 0x00, 0x00, 0xf6]);
        assert_eq!(REPLY_MARKER, 0xf7);
    }
}
