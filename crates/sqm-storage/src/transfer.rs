//! Series transfer to destination directories.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use sqm_core::{AppResult, SqmError, Uploader};

/// [`Uploader`] copying the series file into a destination directory.
///
/// The destination profile is a directory path, typically a network mount
/// or a synced folder. The copy replaces any previous snapshot of the
/// series, so per-slot transfers keep the destination current and the
/// end-of-window transfer leaves the complete file behind.
pub struct DirectoryUploader {
    source_dir: PathBuf,
}

impl DirectoryUploader {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }
}

#[async_trait]
impl Uploader for DirectoryUploader {
    async fn upload(&self, series: &str, destination: &str) -> AppResult<()> {
        let file_name = format!("{series}.txt");
        let from = self.source_dir.join(&file_name);
        let dest_dir = PathBuf::from(destination);
        let to = dest_dir.join(&file_name);

        tokio::fs::create_dir_all(&dest_dir)
            .await
            .map_err(|err| SqmError::Storage(err.to_string()))?;
        tokio::fs::copy(&from, &to)
            .await
            .map_err(|err| SqmError::Storage(err.to_string()))?;
        info!(series = %series, destination = %destination, "series transferred");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordFile;
    use sqm_core::RecordSink;

    #[tokio::test]
    async fn upload_copies_the_series_file() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let sink = RecordFile::new(source.path());
        sink.append("20260303-413", "a,b,c").await.unwrap();

        let uploader = DirectoryUploader::new(source.path());
        uploader
            .upload("20260303-413", dest.path().to_str().unwrap())
            .await
            .unwrap();

        let copied = tokio::fs::read_to_string(dest.path().join("20260303-413.txt"))
            .await
            .unwrap();
        assert!(copied.ends_with("a,b,c\n"));
    }

    #[tokio::test]
    async fn upload_of_a_missing_series_is_a_storage_error() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let uploader = DirectoryUploader::new(source.path());
        let err = uploader
            .upload("20260303-413", dest.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SqmError::Storage(_)));
    }
}
