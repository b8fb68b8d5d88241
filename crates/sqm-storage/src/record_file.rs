//! Append-only record files, one per reading series.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use sqm_core::{AppResult, RecordSink, SqmError};

/// Fixed two-line header written when a series file is created.
const FILE_HEADER: &str = "\
# File format based on SQM Reader Pro 3.1.1.0
Year/Month/Day,Hour/Minute/Second,MPSAS,NELM,SerialNo,Protocol,Model,Feature,Temp(C),EncOffset,SolarAlt(deg),LunarAlt(deg),LunarPhase
";

/// [`RecordSink`] writing one `<series>.txt` file per series under a base
/// directory.
///
/// Files are created with the header on first append and opened in append
/// mode thereafter, so an interrupted run picks up the same file when the
/// series key matches.
pub struct RecordFile {
    dir: PathBuf,
}

impl RecordFile {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing `series`.
    pub fn series_path(&self, series: &str) -> PathBuf {
        self.dir.join(format!("{series}.txt"))
    }

    async fn ensure_file(&self, path: &Path) -> AppResult<bool> {
        if tokio::fs::try_exists(path).await.map_err(storage_err)? {
            return Ok(false);
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(storage_err)?;
        tokio::fs::write(path, FILE_HEADER)
            .await
            .map_err(storage_err)?;
        info!(path = %path.display(), "created record file");
        Ok(true)
    }
}

fn storage_err(err: std::io::Error) -> SqmError {
    SqmError::Storage(err.to_string())
}

#[async_trait]
impl RecordSink for RecordFile {
    async fn append(&self, series: &str, line: &str) -> AppResult<()> {
        let path = self.series_path(series);
        self.ensure_file(&path).await?;

        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .map_err(storage_err)?;
        file.write_all(line.as_bytes()).await.map_err(storage_err)?;
        file.write_all(b"\n").await.map_err(storage_err)?;
        file.flush().await.map_err(storage_err)?;
        debug!(series = %series, "record appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_append_creates_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordFile::new(dir.path());
        sink.append("20260303-413", "2026/03/03,00:00:00,19.50,5.37,413,2,3,1,12.3,0.1,-32.10,14.02,0.47")
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(sink.series_path("20260303-413"))
            .await
            .unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('#'));
        assert!(lines[1].starts_with("Year/Month/Day,"));
        assert!(lines[2].starts_with("2026/03/03,00:00:00,"));
    }

    #[tokio::test]
    async fn later_appends_do_not_rewrite_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordFile::new(dir.path());
        sink.append("20260303-413", "first").await.unwrap();
        sink.append("20260303-413", "second").await.unwrap();

        let content = tokio::fs::read_to_string(sink.series_path("20260303-413"))
            .await
            .unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "first");
        assert_eq!(lines[3], "second");
        assert_eq!(
            content.matches("SQM Reader Pro").count(),
            1,
            "header must be written exactly once"
        );
    }

    #[tokio::test]
    async fn distinct_series_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordFile::new(dir.path());
        sink.append("20260303-413", "a").await.unwrap();
        sink.append("20260304-413", "b").await.unwrap();

        assert!(sink.series_path("20260303-413").is_file());
        assert!(sink.series_path("20260304-413").is_file());
    }

    #[tokio::test]
    async fn missing_base_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("records").join("2026");
        let sink = RecordFile::new(&nested);
        sink.append("20260303-413", "a").await.unwrap();
        assert!(sink.series_path("20260303-413").is_file());
    }
}
