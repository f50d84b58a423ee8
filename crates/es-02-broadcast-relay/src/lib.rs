//! # ES-02 Broadcast Relay
//!
//! Fans significant moments and media chunks out to every connected viewer.
//!
//! ## Flow
//!
//! ```text
//! aggregated-emote-data ─┐
//!                        ├──▶ RelayService ──▶ BroadcastRelay ──▶ snapshot of
//! video-stream ──────────┘                       (Envelope)       ConnectionRegistry
//!                                                                        │
//!                                              ChannelSink (bounded) ◀───┘
//!                                                     │
//!                                              writer task ──▶ WebSocket
//! ```
//!
//! ## Delivery
//!
//! Best-effort and at-most-once per connection. A full connection channel
//! skips the frame for that viewer only; a closed one is unregistered. No
//! broadcast waits on a single slow viewer.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod error;
pub mod registry;
pub mod relay;
pub mod service;
pub mod ws;

pub use domain::{ConnectionId, Envelope, RelayConfig};
pub use error::{RelayError, SendFailure};
pub use registry::{
    ChannelSink, ConnectionRegistry, ConnectionSnapshot, Frame, FrameSink, SinkReceiver,
};
pub use relay::{BroadcastRelay, RelayReport};
pub use service::{router, RelayService, RelayState};
