//! Error taxonomy for thread persistence.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvoError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("thread not found: {0}")]
    NotFound(String),
}
