//! Moment publisher.
//!
//! Serialises a batch of significant moments and sends it to
//! `aggregated-emote-data` as one atomic batch.

use shared_bus::{BusError, BusMessage, TopicBus};
use shared_types::{topics, AggregatedEmoteRecord, SignificantMoment};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Default bound on a single publish call.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Publishing failure. The whole batch failed; nothing was sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transport error: {0}")]
    Transport(#[from] BusError),

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
}

/// Emits computed moments onto the outbound topic.
pub struct AggregatePublisher {
    bus: Arc<dyn TopicBus>,
    topic: String,
    timeout: Duration,
}

impl AggregatePublisher {
    pub fn new(bus: Arc<dyn TopicBus>) -> Self {
        Self {
            bus,
            topic: topics::AGGREGATED_EMOTE_DATA.to_string(),
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish a batch of moments.
    ///
    /// An empty batch is a no-op and sends nothing. Returns the number of
    /// messages sent.
    pub async fn publish(&self, moments: &[SignificantMoment]) -> Result<usize, PublishError> {
        if moments.is_empty() {
            return Ok(0);
        }

        let messages = moments
            .iter()
            .map(|moment| {
                serde_json::to_vec(&AggregatedEmoteRecord::from(moment))
                    .map(|payload| BusMessage::new(self.topic.as_str(), payload))
                    .map_err(|e| PublishError::Serialization(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let sent = tokio::time::timeout(self.timeout, self.bus.publish_batch(messages))
            .await
            .map_err(|_| PublishError::Timeout(self.timeout))??;

        for moment in moments {
            debug!(
                window = %moment.window,
                emote = %moment.emote,
                count = moment.count,
                total = moment.total_in_window,
                "Significant moment"
            );
        }
        info!(count = sent, topic = %self.topic, "Significant moments sent");
        Ok(sent)
    }
}
