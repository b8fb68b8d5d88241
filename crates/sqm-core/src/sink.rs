//! Collaborator sinks the polling loop hands each reading to.
//!
//! Persistence is the product of the run, so [`RecordSink`] errors are
//! fatal to the caller. [`Plotter`] and [`Uploader`] are best-effort side
//! effects: the loop logs their failures and carries on.

use async_trait::async_trait;

use crate::error::AppResult;

/// Append-only record persistence, keyed by output series.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append one record line to the series, creating it (with any header
    /// the format requires) on first write.
    async fn append(&self, series: &str, line: &str) -> AppResult<()>;
}

/// Plot renderer for a series. Fires per slot, best-effort.
#[async_trait]
pub trait Plotter: Send + Sync {
    async fn render(&self, series: &str) -> AppResult<()>;
}

/// Remote transfer of a series to a destination profile. Fires per slot and
/// once more at end-of-window, best-effort.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, series: &str, destination: &str) -> AppResult<()>;
}

/// Plotter that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPlotter;

#[async_trait]
impl Plotter for NoopPlotter {
    async fn render(&self, _series: &str) -> AppResult<()> {
        Ok(())
    }
}

/// Uploader that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUploader;

#[async_trait]
impl Uploader for NoopUploader {
    async fn upload(&self, _series: &str, _destination: &str) -> AppResult<()> {
        Ok(())
    }
}
