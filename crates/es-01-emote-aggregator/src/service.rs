//! Aggregator service loop.
//!
//! One task consumes `raw-emote-data` one message at a time: parse, ingest,
//! and publish whatever a flush produced before taking the next message.

use crate::domain::{EventIngestor, IngestOutcome, SettingsStore};
use crate::publisher::{AggregatePublisher, PublishError};
use shared_bus::{BusError, BusMessage, TopicBus, TopicFilter};
use shared_types::{topics, RawEmoteRecord};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Failures that end one run of the aggregator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregatorError {
    /// The bus could not be reached.
    #[error("transport unavailable: {0}")]
    Transport(#[from] BusError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    /// The inbound subscription ended without a shutdown request.
    #[error("subscription ended")]
    SubscriptionEnded,
}

/// Counters for one aggregator instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub received: u64,
    pub malformed: u64,
    pub dropped: u64,
    pub flushes: u64,
    pub moments_published: u64,
}

/// Owns the ingestor and the publisher. The buffer survives reconnects.
pub struct EmoteAggregator {
    bus: Arc<dyn TopicBus>,
    ingestor: EventIngestor,
    publisher: AggregatePublisher,
    stats: AggregatorStats,
}

impl EmoteAggregator {
    pub fn new(bus: Arc<dyn TopicBus>, settings: Arc<SettingsStore>) -> Self {
        let publisher = AggregatePublisher::new(Arc::clone(&bus));
        Self::with_publisher(bus, settings, publisher)
    }

    pub fn with_publisher(
        bus: Arc<dyn TopicBus>,
        settings: Arc<SettingsStore>,
        publisher: AggregatePublisher,
    ) -> Self {
        Self {
            bus,
            ingestor: EventIngestor::new(settings),
            publisher,
            stats: AggregatorStats::default(),
        }
    }

    pub fn stats(&self) -> AggregatorStats {
        self.stats
    }

    pub fn buffered(&self) -> usize {
        self.ingestor.buffered()
    }

    /// Connect, subscribe and consume until shutdown or failure.
    ///
    /// Returns `Ok(())` only when `shutdown` fires. Any transport or publish
    /// failure ends the run with an error so the caller can reconnect.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), AggregatorError> {
        self.bus.connect().await?;
        let mut subscription = self
            .bus
            .subscribe(TopicFilter::topics([topics::RAW_EMOTE_DATA]))?;
        info!(topic = topics::RAW_EMOTE_DATA, "Aggregator subscribed");

        loop {
            if *shutdown.borrow() {
                info!("Aggregator stopping");
                return Ok(());
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Aggregator stopping");
                        return Ok(());
                    }
                }
                message = subscription.recv() => {
                    match message {
                        Some(message) => self.handle_message(&message).await?,
                        None => return Err(AggregatorError::SubscriptionEnded),
                    }
                }
            }
        }
    }

    /// Process one inbound message to completion.
    pub async fn handle_message(&mut self, message: &BusMessage) -> Result<(), AggregatorError> {
        self.stats.received += 1;

        let event = match RawEmoteRecord::from_slice(&message.payload)
            .and_then(RawEmoteRecord::into_event)
        {
            Ok(event) => event,
            Err(e) => {
                self.stats.malformed += 1;
                warn!(error = %e, topic = %message.topic, "Skipping malformed emote message");
                return Ok(());
            }
        };

        match self.ingestor.ingest(event) {
            IngestOutcome::Dropped => self.stats.dropped += 1,
            IngestOutcome::Buffered { len } => debug!(buffered = len, "Emote buffered"),
            IngestOutcome::Flushed { passes, moments } => {
                self.stats.flushes += passes as u64;
                let sent = self.publisher.publish(&moments).await?;
                self.stats.moments_published += sent as u64;
            }
        }
        Ok(())
    }
}
