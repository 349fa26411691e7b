use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while touching the data file or the backups. None of these are
/// fatal; callers degrade to defaults, skip the step, or raise a single alert.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The data file exists but could not be read or parsed.
    #[error("Data file {path:?} is unreadable: {reason}")]
    ReadCorrupt { path: PathBuf, reason: String },

    /// The data file exists but reading it failed for a reason unrelated to its content.
    #[error("Failed to read {path:?}: {source}")]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the data file failed. The file on disk is left as it was before the write.
    #[error("Failed to write {path:?}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Creating, listing or deleting a backup file failed.
    #[error("Backup operation on {path:?} failed: {source}")]
    BackupIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No session at index {index}, store has {len}")]
    NoSuchSession { index: usize, len: usize },
}

impl StoreError {
    /// Whether the user should be alerted about this error. True whenever a change to the data
    /// file didn't make it to disk.
    pub fn needs_alert(&self) -> bool {
        matches!(
            self,
            StoreError::WriteFailure { .. }
                | StoreError::Serialize(_)
                | StoreError::ReadFailure { .. }
                | StoreError::ReadCorrupt { .. }
        )
    }
}
