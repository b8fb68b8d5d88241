//! TCP session ownership for the SQM-LE.
//!
//! The device firmware accepts exactly one command per TCP connection.
//! After a transaction the connection must be drained and replaced before
//! the next command, or the protocol desynchronizes. [`SessionManager`]
//! owns the single live socket and implements that drain-and-reconnect
//! cycle; there is never more than one socket alive, and the old one is
//! fully dropped before the replacement connect begins.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};

use sqm_core::{retry_for, AppResult, SqmError};

/// Backoff between connection attempts.
const CONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// A read that stays silent this long is treated as drained. The device
/// normally closes after its reply, which ends the drain with a zero-length
/// read; the window only guards against a peer that keeps the connection
/// open with nothing to send.
const DRAIN_WINDOW: Duration = Duration::from_millis(250);

/// Owner of the single live TCP session to the device.
pub struct SessionManager {
    peer: SocketAddr,
    connect_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl SessionManager {
    pub fn new(addr: IpAddr, port: u16, connect_timeout: Duration) -> Self {
        Self {
            peer: SocketAddr::new(addr, port),
            connect_timeout,
            stream: Mutex::new(None),
        }
    }

    /// Peer the session targets.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Establish the initial session.
    ///
    /// Retries the handshake with a fixed backoff until the connect timeout
    /// elapses; exhaustion is [`SqmError::ConnectFailed`], fatal to the
    /// caller (a fresh discovery pass is the only recovery).
    pub async fn connect(&self) -> AppResult<()> {
        let stream = self.open().await?;
        *self.stream.lock().await = Some(stream);
        tracing::info!(peer = %self.peer, "session established");
        Ok(())
    }

    /// Mandatory post-transaction reset: drain, close, reconnect.
    pub async fn reset(&self) -> AppResult<()> {
        let mut guard = self.stream.lock().await;
        if let Some(mut old) = guard.take() {
            drain(&mut old).await;
        }
        // Old socket is dropped here; never two sockets at once.
        *guard = Some(self.open().await?);
        tracing::debug!(peer = %self.peer, "session reset");
        Ok(())
    }

    /// Borrow the live stream for a single transaction.
    ///
    /// The caller must invoke [`SessionManager::reset`] afterwards; the
    /// protocol layer does so unconditionally.
    pub(crate) async fn stream_guard(&self) -> MutexGuard<'_, Option<TcpStream>> {
        self.stream.lock().await
    }

    async fn open(&self) -> AppResult<TcpStream> {
        let timeout_secs = self.connect_timeout.as_secs();
        retry_for(self.connect_timeout, CONNECT_BACKOFF, || async {
            TcpStream::connect(self.peer).await.map_err(SqmError::Io)
        })
        .await
        .map_err(|err| {
            tracing::error!(peer = %self.peer, error = %err, "session handshake exhausted its timeout");
            SqmError::ConnectFailed {
                addr: self.peer,
                timeout_secs,
            }
        })
    }
}

/// Discard everything still pending on the socket until the peer proves it
/// has nothing more to send (zero-length read), errors out, or goes silent.
async fn drain(stream: &mut TcpStream) {
    let mut buf = [0u8; 256];
    loop {
        match tokio::time::timeout(DRAIN_WINDOW, stream.read(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => tracing::debug!(bytes = n, "discarded stale reply bytes"),
            Ok(Err(_)) | Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn connect_failed_after_timeout() {
        // Nothing listens on a closed loopback port; every handshake attempt
        // is refused until the timeout lapses.
        let manager = SessionManager::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            1,
            Duration::from_millis(50),
        );
        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, SqmError::ConnectFailed { .. }));
    }

    #[tokio::test]
    async fn connect_succeeds_against_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let manager = SessionManager::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            Duration::from_secs(5),
        );
        manager.connect().await.unwrap();
        assert!(manager.stream_guard().await.is_some());
    }
}
