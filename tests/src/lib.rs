//! # Emote-Stream Test Suite
//!
//! Cross-crate flows that unit tests cannot cover.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── flows.rs      # bus → aggregator → relay → viewer channel
//!     ├── relay_ws.rs   # real WebSocket clients against the relay server
//!     └── node_e2e.rs   # a whole node over HTTP and WebSocket
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p es-tests
//! cargo test -p es-tests integration::relay_ws::
//! ```

pub mod integration;
