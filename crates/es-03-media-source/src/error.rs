//! Media source failures and which of them are worth retrying.

use shared_bus::BusError;
use std::path::PathBuf;
use thiserror::Error;

/// Media source failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The video file does not exist. Not retried.
    #[error("video file not found at {0}")]
    NotFound(PathBuf),

    /// The video file holds no bytes, so there is nothing to loop over.
    #[error("video file {0} is empty")]
    Empty(PathBuf),

    #[error("io error: {0}")]
    Io(String),

    #[error("transport error: {0}")]
    Transport(#[from] BusError),

    #[error("invalid media config: {0}")]
    InvalidConfig(String),
}

impl MediaError {
    /// Whether retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MediaError::NotFound(_) | MediaError::Empty(_) | MediaError::InvalidConfig(_)
        )
    }
}

impl From<std::io::Error> for MediaError {
    fn from(e: std::io::Error) -> Self {
        MediaError::Io(e.to_string())
    }
}
