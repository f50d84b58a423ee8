//! # Topic Publisher
//!
//! The `TopicBus` port and its in-memory adapter.

use crate::message::{BusMessage, TopicFilter};
use crate::subscriber::TopicSubscription;
use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_MESSAGE_BYTES};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Transport-level failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus has been closed; nothing can be sent or received.
    #[error("bus closed")]
    Closed,

    /// The payload exceeds the configured limit.
    #[error("message too large: {size} > {max} bytes")]
    MessageTooLarge { size: usize, max: usize },
}

/// Bus sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Messages retained per subscriber (the rolling window).
    pub capacity: usize,
    /// Largest accepted payload.
    pub max_message_bytes: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// Pub/sub transport used by every subsystem.
///
/// `publish_batch` is all-or-nothing with respect to validation: either every
/// message is accepted or none is sent.
#[async_trait]
pub trait TopicBus: Send + Sync {
    /// Establish the transport. Fails with `BusError::Closed` once closed.
    async fn connect(&self) -> Result<(), BusError>;

    /// Publish one message. Returns the number of subscribers reached.
    async fn publish(&self, message: BusMessage) -> Result<usize, BusError>;

    /// Publish a batch without interleaving other publishers.
    /// Returns the number of messages sent.
    async fn publish_batch(&self, messages: Vec<BusMessage>) -> Result<usize, BusError>;

    /// Subscribe to the topics selected by `filter`.
    fn subscribe(&self, filter: TopicFilter) -> Result<TopicSubscription, BusError>;

    /// Release the transport. Open subscriptions drain and then end.
    fn close(&self);

    fn is_closed(&self) -> bool;

    /// Total messages accepted for sending.
    fn messages_published(&self) -> u64;
}

/// In-memory implementation of the bus.
///
/// One `tokio::sync::broadcast` channel carries every topic; subscriptions
/// filter on the receiving side.
pub struct InMemoryTopicBus {
    /// `None` once closed. The lock also serialises batches.
    sender: Mutex<Option<broadcast::Sender<BusMessage>>>,

    /// Total messages published.
    messages_published: AtomicU64,

    config: BusConfig,
}

impl InMemoryTopicBus {
    /// Create a bus with default sizing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
            messages_published: AtomicU64::new(0),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> BusConfig {
        self.config
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .lock()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn check_size(&self, message: &BusMessage) -> Result<(), BusError> {
        let size = message.payload.len();
        if size > self.config.max_message_bytes {
            return Err(BusError::MessageTooLarge {
                size,
                max: self.config.max_message_bytes,
            });
        }
        Ok(())
    }
}

impl Default for InMemoryTopicBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TopicBus for InMemoryTopicBus {
    async fn connect(&self) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        Ok(())
    }

    async fn publish(&self, message: BusMessage) -> Result<usize, BusError> {
        self.check_size(&message)?;

        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(BusError::Closed)?;
        let topic = message.topic.clone();
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        // No receivers is not a failure: the message is simply not retained.
        let receivers = sender.send(message).unwrap_or(0);
        debug!(topic = %topic, receivers, "Message published");
        Ok(receivers)
    }

    async fn publish_batch(&self, messages: Vec<BusMessage>) -> Result<usize, BusError> {
        for message in &messages {
            self.check_size(message)?;
        }

        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(BusError::Closed)?;
        let count = messages.len();
        for message in messages {
            let _ = sender.send(message);
        }
        self.messages_published
            .fetch_add(count as u64, Ordering::Relaxed);
        debug!(count, "Batch published");
        Ok(count)
    }

    fn subscribe(&self, filter: TopicFilter) -> Result<TopicSubscription, BusError> {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(BusError::Closed)?;
        debug!(topics = ?filter.topics, "New subscription created");
        Ok(TopicSubscription::new(sender.subscribe(), filter))
    }

    fn close(&self) {
        if self.sender.lock().take().is_some() {
            info!("Topic bus closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}
