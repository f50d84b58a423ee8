//! Reaction buffering.
//!
//! The ingestor is owned by a single task; it is never shared, so the buffer
//! needs no lock. Settings are read from the shared store on every event.

use crate::domain::analyzer::SignificanceAnalyzer;
use crate::domain::settings::SettingsStore;
use shared_types::{ReactionEvent, SignificantMoment};
use std::sync::Arc;
use tracing::{debug, trace};

/// What happened to one ingested event.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// The emote is not in the allow-list.
    Dropped,
    /// The event was buffered; no flush yet.
    Buffered { len: usize },
    /// The buffer reached `interval` and was analysed.
    Flushed {
        /// Analysis passes run (1 unless `interval` shrank).
        passes: usize,
        /// Moments from every pass, in pass order.
        moments: Vec<SignificantMoment>,
    },
}

/// Filters and buffers reaction events, triggering analysis on flush.
pub struct EventIngestor {
    settings: Arc<SettingsStore>,
    buffer: Vec<ReactionEvent>,
}

impl EventIngestor {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        let capacity = settings.snapshot().interval;
        Self {
            settings,
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Ingest one event.
    ///
    /// Disallowed emotes are dropped before buffering. When the buffer holds
    /// `interval` events they are analysed and removed. If `interval` was
    /// lowered below the buffer length, the buffer is drained in passes of
    /// exactly `interval` events.
    pub fn ingest(&mut self, event: ReactionEvent) -> IngestOutcome {
        let settings = self.settings.snapshot();

        if !settings.is_allowed(&event.emote) {
            trace!(emote = %event.emote, "Dropping disallowed emote");
            return IngestOutcome::Dropped;
        }

        self.buffer.push(event);
        let interval = settings.interval;
        if self.buffer.len() < interval {
            return IngestOutcome::Buffered {
                len: self.buffer.len(),
            };
        }

        let analyzer = SignificanceAnalyzer::new(settings.threshold);
        let mut moments = Vec::new();
        let mut passes = 0;
        while self.buffer.len() >= interval {
            let batch: Vec<ReactionEvent> = self.buffer.drain(..interval).collect();
            moments.extend(analyzer.analyze(&batch));
            passes += 1;
        }

        debug!(
            passes,
            moments = moments.len(),
            remaining = self.buffer.len(),
            "Buffer flushed"
        );
        IngestOutcome::Flushed { passes, moments }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }
}
