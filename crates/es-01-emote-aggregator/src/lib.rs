//! # ES-01 Emote Aggregator
//!
//! Turns the raw reaction stream into significant moments.
//!
//! ## Flow
//!
//! ```text
//! raw-emote-data ──▶ EventIngestor ──(buffer full)──▶ SignificanceAnalyzer
//!                        │                                   │
//!                  allow-list filter                  SignificantMoment*
//!                                                            │
//!                                                            ▼
//!                                 aggregated-emote-data ◀── AggregatePublisher
//! ```
//!
//! ## Layers
//!
//! - **Domain** (`domain/`): `Settings`/`SettingsStore`, `EventIngestor`,
//!   `SignificanceAnalyzer`. No I/O.
//! - **Publisher** (`publisher`): serialises moments onto the bus.
//! - **Service** (`service`): the single consume loop that owns the buffer.
//! - **API** (`api`): HTTP settings surface and emote intake.
//!
//! ## Invariants
//!
//! - Disallowed emotes never enter the buffer.
//! - Each analysis pass sees exactly `interval` events; the consumed events are
//!   removed from the buffer whether or not a moment qualified.
//! - `threshold` is strictly inside (0, 1).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod api;
pub mod domain;
pub mod publisher;
pub mod service;

pub use api::{router as api_router, ApiState};
pub use domain::{
    EventIngestor, IngestOutcome, SettingsError, SettingsStore, Settings, SignificanceAnalyzer,
    WindowTally,
};
pub use publisher::{AggregatePublisher, PublishError};
pub use service::{AggregatorError, AggregatorStats, EmoteAggregator};
