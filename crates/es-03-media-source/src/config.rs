//! Media source settings.

use crate::error::MediaError;
use shared_types::topics::CHUNK_SIZE;
use std::path::PathBuf;
use std::time::Duration;

/// Default pause between chunks.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(50);

/// Media source configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSourceConfig {
    /// Video file to stream.
    pub path: PathBuf,
    /// Bytes per chunk; the last chunk of a pass may be shorter.
    pub chunk_size: usize,
    /// Pause after each chunk.
    pub chunk_delay: Duration,
}

impl MediaSourceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chunk_size: CHUNK_SIZE,
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_chunk_delay(mut self, chunk_delay: Duration) -> Self {
        self.chunk_delay = chunk_delay;
        self
    }

    pub fn validate(&self) -> Result<(), MediaError> {
        if self.chunk_size == 0 {
            return Err(MediaError::InvalidConfig("chunk_size must be > 0".into()));
        }
        if self.path.as_os_str().is_empty() {
            return Err(MediaError::InvalidConfig("path is empty".into()));
        }
        Ok(())
    }
}
