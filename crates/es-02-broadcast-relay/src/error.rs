//! Relay error types.

use shared_bus::BusError;
use thiserror::Error;

/// Errors of the relay service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("transport error: {0}")]
    Transport(#[from] BusError),

    #[error("subscription ended")]
    SubscriptionEnded,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid relay config: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Serialization(e.to_string())
    }
}

/// Why a frame could not be handed to one connection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The viewer is not keeping up; this frame is skipped for it.
    #[error("connection channel full")]
    Full,

    /// The connection is gone.
    #[error("connection closed")]
    Closed,
}
