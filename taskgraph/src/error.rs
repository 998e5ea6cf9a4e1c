//! Store error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("save rejected: on-disk version {on_disk} >= attempted version {attempted}")]
    StaleVersion { on_disk: u64, attempted: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("backup error: {0}")]
    Backup(#[from] crate::git_backup::BackupError),
}
