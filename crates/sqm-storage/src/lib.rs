//! `sqm-storage`
//!
//! File-backed persistence for sky-brightness reading series.

pub mod record_file;
pub mod transfer;

pub use record_file::RecordFile;
pub use transfer::DirectoryUploader;
