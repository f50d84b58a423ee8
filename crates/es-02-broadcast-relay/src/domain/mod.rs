//! Relay domain: connection identity, client envelopes and configuration.

pub mod config;
pub mod connection;
pub mod envelope;

pub use config::RelayConfig;
pub use connection::ConnectionId;
pub use envelope::Envelope;
