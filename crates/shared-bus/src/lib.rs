//! # Shared Bus - Topic Transport
//!
//! The pub/sub seam between the stream subsystems.
//!
//! ```text
//! ┌──────────────┐   publish()    ┌──────────────┐  subscribe()  ┌──────────────┐
//! │ Media source │ ─────────────▶ │   TopicBus   │ ────────────▶ │    Relay     │
//! │ Aggregator   │                │              │               │  Aggregator  │
//! └──────────────┘                └──────────────┘               └──────────────┘
//! ```
//!
//! `TopicBus` is the port; `InMemoryTopicBus` is the single-node adapter built
//! on `tokio::sync::broadcast`. A networked broker would be another adapter
//! behind the same trait.
//!
//! Delivery is at-most-once: a subscriber that falls behind the channel
//! capacity loses the oldest messages.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod message;
pub mod publisher;
pub mod subscriber;

pub use message::{BusMessage, TopicFilter};
pub use publisher::{BusConfig, BusError, InMemoryTopicBus, TopicBus};
pub use subscriber::{SubscriptionError, TopicSubscription};

/// Messages buffered per subscriber before the oldest are overwritten.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Largest payload accepted by `publish`.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;
