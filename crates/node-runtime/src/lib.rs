//! # Node Runtime Library
//!
//! Configuration, supervision and wiring of an emote-stream node. The binary
//! in `main.rs` is a thin shell over [`EmoteStreamNode`].
//!
//! ## Startup
//!
//! 1. Read `LoggingConfig` and initialise `tracing`
//! 2. Read and validate `NodeConfig`
//! 3. Bind the relay and settings listeners
//! 4. Spawn the aggregator, relay and media source under supervisors
//!
//! ## Shutdown
//!
//! 1. Signal shutdown: ingestion and the media source stop
//! 2. Close every viewer connection
//! 3. Close the bus
//! 4. Stop the HTTP servers

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod node;
pub mod supervisor;

pub use config::{ConfigError, LoggingConfig, NodeConfig};
pub use node::{EmoteStreamNode, NodeError, RunningNode};
pub use supervisor::{RetryPolicy, Retryable, Supervisor, SupervisorExit};
