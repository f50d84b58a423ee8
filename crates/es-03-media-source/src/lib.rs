//! # ES-03 Media Source
//!
//! Reads a video file in fixed-size chunks and publishes each one to
//! `video-stream` with its sequence index in the `index` header. At end of
//! file the index restarts at 0 and reading starts over, until shutdown.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod error;
pub mod source;

pub use config::{MediaSourceConfig, DEFAULT_CHUNK_DELAY};
pub use error::MediaError;
pub use source::{MediaSource, PassSummary};
