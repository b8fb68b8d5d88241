//! Error taxonomy for the monitor.
//!
//! A single [`SqmError`] enum covers every failure the workspace can surface,
//! split along recovery lines:
//!
//! - **Fatal at startup**: [`SqmError::NotFound`] (discovery exhausted its
//!   timeout) and [`SqmError::ConnectFailed`] (no TCP session within the
//!   timeout). There is no recovery short of a fresh discovery pass, so the
//!   caller aborts.
//! - **Recoverable per attempt**: [`SqmError::Io`] and [`SqmError::Protocol`]
//!   from a single read/write or a malformed reply. The polling loop absorbs
//!   these up to its per-attempt timeout and then degrades the slot to the
//!   failure sentinel instead of terminating a multi-hour run.
//! - **Fatal preconditions**: [`SqmError::WindowInvalid`] for a schedule
//!   window that is not actionable (stop not in the future, or attempt
//!   timeout not shorter than the interval).
//! - **Fatal at runtime**: [`SqmError::Storage`]: the record file is the
//!   product of the run, so persistence failures are not absorbed.
//!
//! Plot and transfer collaborators are best-effort: their errors are logged
//! at the call site and never become an `SqmError` on the main path.

use std::net::SocketAddr;
use thiserror::Error;

/// Convenience alias for results using the workspace error type.
pub type AppResult<T> = std::result::Result<T, SqmError>;

/// Primary error type for the monitor.
#[derive(Error, Debug)]
pub enum SqmError {
    /// Discovery timed out without a matching reply datagram.
    #[error("no device answered the discovery probe within {timeout_secs}s")]
    NotFound { timeout_secs: u64 },

    /// A TCP session could not be established within the timeout.
    #[error("could not establish a session with {addr} within {timeout_secs}s")]
    ConnectFailed { addr: SocketAddr, timeout_secs: u64 },

    /// A single read/write against the device failed.
    #[error("device I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The device replied, but the reply did not parse.
    #[error("malformed device reply: {0}")]
    Protocol(String),

    /// The schedule window violates a precondition.
    #[error("schedule window is not actionable: {0}")]
    WindowInvalid(String),

    /// The record file could not be written.
    #[error("record storage failure: {0}")]
    Storage(String),
}

impl SqmError {
    /// Whether the polling loop may absorb this error and retry the attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SqmError::Io(_) | SqmError::Protocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_kinds() {
        let io = SqmError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "x"));
        assert!(io.is_recoverable());
        assert!(SqmError::Protocol("bad field count".into()).is_recoverable());
        assert!(!SqmError::NotFound { timeout_secs: 60 }.is_recoverable());
        assert!(!SqmError::WindowInvalid("stop in the past".into()).is_recoverable());
    }
}
