//! In-process simulated SQM-LE for tests.
//!
//! Speaks the real wire shapes on loopback: answers the UDP discovery probe
//! with a marker-tagged reply carrying a hardware address, and serves the
//! one-command-per-connection TCP protocol, closing each connection after
//! its reply exactly as the hardware's ethernet bridge does.
//!
//! Every accepted TCP connection is counted, which lets tests assert the
//! mandatory reset happened once per attempt.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

/// Identity reply, exactly 38 bytes.
const IDENTITY_REPLY: &[u8] = b"i,00000002,00000003,00000001,0000413\r\n";

/// Measurement reply, exactly 56 bytes: magnitude 19.50 mpsas, 23.2 C.
const MEASUREMENT_REPLY: &[u8] = b"r, 19.50m,0000000005,0000000.000,0000000.000,000023.2C\r\n";

/// Simulated hardware address embedded in the discovery reply.
const MAC: [u8; 6] = [0x00, 0x20, 0x4a, 0xb0, 0x12, 0x34];

/// Loopback SQM-LE simulator.
pub struct SimDevice {
    tcp_addr: SocketAddr,
    udp_addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
    fail_measurements: Arc<AtomicBool>,
}

impl SimDevice {
    /// Bind loopback sockets and start serving.
    pub async fn spawn() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let udp = UdpSocket::bind("127.0.0.1:0").await?;
        let tcp_addr = listener.local_addr()?;
        let udp_addr = udp.local_addr()?;

        let accepts = Arc::new(AtomicUsize::new(0));
        let fail_measurements = Arc::new(AtomicBool::new(false));

        let accepts_task = accepts.clone();
        let fail_task = fail_measurements.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                accepts_task.fetch_add(1, Ordering::SeqCst);
                let fail = fail_task.clone();
                tokio::spawn(async move {
                    serve_connection(stream, &fail).await;
                });
            }
        });

        tokio::spawn(async move {
            let mut buf = [0u8; 16];
            loop {
                let Ok((len, peer)) = udp.recv_from(&mut buf).await else {
                    break;
                };
                if buf[..len] == [0x00, 0x00, 0x00, 0xf6] {
                    let mut reply = [0u8; 30];
                    reply[3] = 0xf7;
                    reply[24..30].copy_from_slice(&MAC);
                    let _ = udp.send_to(&reply, peer).await;
                }
            }
        });

        Ok(Self {
            tcp_addr,
            udp_addr,
            accepts,
            fail_measurements,
        })
    }

    /// Address of the simulated session port.
    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    /// Address of the simulated discovery port.
    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// Hardware address the discovery reply carries, colon-hex.
    pub fn mac(&self) -> String {
        MAC.iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Number of TCP connections accepted so far. One per transaction plus
    /// one for the initial connect.
    pub fn accept_count(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    /// When set, measurement connections are closed without a reply.
    pub fn set_fail_measurements(&self, fail: bool) {
        self.fail_measurements.store(fail, Ordering::SeqCst);
    }
}

/// Serve one connection: one command, one reply, close.
///
/// The failure flag is sampled when the command arrives, not at accept
/// time; the client reconnects eagerly after every transaction, so an
/// accept-time snapshot would lag the test's toggles by one connection.
async fn serve_connection(mut stream: TcpStream, fail_measurements: &AtomicBool) {
    let mut cmd = [0u8; 2];
    if stream.read_exact(&mut cmd).await.is_err() {
        return;
    }
    match &cmd {
        b"ix" => {
            let _ = stream.write_all(IDENTITY_REPLY).await;
        }
        b"rx" if !fail_measurements.load(Ordering::SeqCst) => {
            let _ = stream.write_all(MEASUREMENT_REPLY).await;
        }
        // Unknown command, or a deliberately failing measurement: close
        // without replying so the client's read errors out.
        _ => {}
    }
    // Connection drops here; the device closes after every transaction.
}
