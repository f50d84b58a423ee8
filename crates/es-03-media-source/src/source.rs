//! The chunk loop.

use crate::config::MediaSourceConfig;
use crate::error::MediaError;
use bytes::BytesMut;
use shared_bus::{BusError, BusMessage, TopicBus};
use shared_types::{topics, MediaChunk};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Counts for one pass over the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub published: u64,
    pub skipped: u64,
    /// The pass ended early because shutdown fired.
    pub interrupted: bool,
}

/// Streams one file to `video-stream` in a loop.
pub struct MediaSource {
    bus: Arc<dyn TopicBus>,
    config: MediaSourceConfig,
    published: AtomicU64,
}

impl MediaSource {
    pub fn new(bus: Arc<dyn TopicBus>, config: MediaSourceConfig) -> Self {
        Self {
            bus,
            config,
            published: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MediaSourceConfig {
        &self.config
    }

    /// Chunks published since creation.
    pub fn chunks_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Stream until shutdown fires or a failure occurs.
    ///
    /// A missing or empty file fails immediately (see
    /// [`MediaError::is_fatal`]); bus failures other than an oversized chunk end
    /// the run so the caller can retry.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), MediaError> {
        self.config.validate()?;
        match tokio::fs::metadata(&self.config.path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(MediaError::NotFound(self.config.path.clone())),
        }
        self.bus.connect().await?;
        info!(path = %self.config.path.display(), "Streaming video");

        loop {
            let summary = self.stream_once(&mut shutdown).await?;
            if summary.interrupted {
                info!("Media source stopping");
                return Ok(());
            }
            if summary.published == 0 && summary.skipped == 0 {
                return Err(MediaError::Empty(self.config.path.clone()));
            }
            info!(
                chunks = summary.published,
                skipped = summary.skipped,
                "Video streaming completed, restarting"
            );
        }
    }

    /// One pass from the start of the file; indexes start at 0.
    pub async fn stream_once(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<PassSummary, MediaError> {
        let mut file = File::open(&self.config.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MediaError::NotFound(self.config.path.clone())
            } else {
                MediaError::from(e)
            }
        })?;
        let mut summary = PassSummary::default();
        let mut index = 0u64;

        loop {
            if *shutdown.borrow() {
                summary.interrupted = true;
                return Ok(summary);
            }

            let payload = read_chunk(&mut file, self.config.chunk_size).await?;
            if payload.is_empty() {
                return Ok(summary);
            }

            let chunk = MediaChunk::new(index, payload);
            match self.publish(&chunk).await {
                Ok(()) => {
                    summary.published += 1;
                    index += 1;
                }
                Err(BusError::MessageTooLarge { size, max }) => {
                    warn!(index, size, max, "Chunk too large, skipping");
                    summary.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }

            if self.pause(shutdown).await {
                summary.interrupted = true;
                return Ok(summary);
            }
        }
    }

    async fn publish(&self, chunk: &MediaChunk) -> Result<(), BusError> {
        let message = BusMessage::new(topics::VIDEO_STREAM, chunk.payload.clone())
            .with_header(topics::INDEX_HEADER, chunk.sequence_index);
        self.bus.publish(message).await?;
        self.published.fetch_add(1, Ordering::Relaxed);
        debug!(index = chunk.sequence_index, bytes = chunk.payload.len(), "Chunk published");
        Ok(())
    }

    /// Wait `chunk_delay`. Returns `true` if shutdown fired meanwhile.
    async fn pause(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.config.chunk_delay) => *shutdown.borrow(),
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }
}

/// Read up to `size` bytes, stopping short only at end of file.
async fn read_chunk(file: &mut File, size: usize) -> Result<BytesMut, MediaError> {
    let mut buf = BytesMut::zeroed(size);
    let mut filled = 0;
    while filled < size {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}
