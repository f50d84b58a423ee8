//! Relay configuration.

use crate::error::RelayError;
use std::time::Duration;

/// Default name announced in the welcome frame.
pub const DEFAULT_SERVER_NAME: &str = "relay";

/// Default per-connection outbound queue, in frames.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default bound on a single socket send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Default largest accepted inbound frame (64 KiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Relay server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Announced to viewers in the welcome frame.
    pub server_name: String,
    /// Outbound frames queued per connection before frames are skipped.
    pub channel_capacity: usize,
    /// A socket send slower than this ends the connection.
    pub send_timeout: Duration,
    /// Inbound frames larger than this drop the connection.
    pub max_message_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_name: DEFAULT_SERVER_NAME.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.server_name.trim().is_empty() {
            return Err(RelayError::InvalidConfig("server_name is empty".into()));
        }
        if self.channel_capacity == 0 {
            return Err(RelayError::InvalidConfig(
                "channel_capacity must be > 0".into(),
            ));
        }
        if self.send_timeout.is_zero() {
            return Err(RelayError::InvalidConfig("send_timeout must be > 0".into()));
        }
        if self.max_message_size == 0 {
            return Err(RelayError::InvalidConfig(
                "max_message_size must be > 0".into(),
            ));
        }
        Ok(())
    }
}
