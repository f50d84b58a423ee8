//! # Node Configuration
//!
//! Every setting comes from the environment and has a default. A value that
//! does not parse falls back to its default with a warning.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `PORT` | 3003 (relay) |
//! | `SETTINGS_PORT` | 3001 |
//! | `BIND_ADDR` | `0.0.0.0` |
//! | `SERVER_NAME` | `relay` |
//! | `VIDEO_PATH` | unset (media source disabled) |
//! | `ES_BUS_CAPACITY` | 1024 |
//! | `ES_RETRY_DELAY_SECS` | 5 |
//! | `ES_MAX_RETRIES` | unset (retry forever) |
//! | `ES_LOG_LEVEL` or `RUST_LOG` | `info` |
//! | `ES_JSON_LOGS` | `false` |

use es_02_broadcast_relay::RelayConfig;
use shared_bus::{BusConfig, DEFAULT_CHANNEL_CAPACITY};
use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::supervisor::RetryPolicy;

pub const DEFAULT_RELAY_PORT: u16 = 3003;
pub const DEFAULT_SETTINGS_PORT: u16 = 3001;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("relay and settings servers cannot share port {0}")]
    SamePort(u16),

    #[error("bus capacity must be > 0")]
    ZeroBusCapacity,

    #[error("server name is empty")]
    EmptyServerName,
}

/// Logging settings, read before anything else so later warnings are visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive.
    pub level: String,
    pub json: bool,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            level: lookup("ES_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "info".to_string()),
            json: lookup("ES_JSON_LOGS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// WebSocket relay listening port.
    pub relay_port: u16,
    /// Settings API listening port.
    pub settings_port: u16,
    pub bind_addr: IpAddr,
    /// Announced in the welcome frame.
    pub server_name: String,
    /// Video file for the media source; `None` disables it.
    pub video_path: Option<PathBuf>,
    /// Messages retained per bus subscriber.
    pub bus_capacity: usize,
    /// Pause between supervised restarts.
    pub retry_delay: Duration,
    /// Failed runs tolerated per task; `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            relay_port: DEFAULT_RELAY_PORT,
            settings_port: DEFAULT_SETTINGS_PORT,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            server_name: es_02_broadcast_relay::domain::config::DEFAULT_SERVER_NAME.to_string(),
            video_path: None,
            bus_capacity: DEFAULT_CHANNEL_CAPACITY,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: None,
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            relay_port: parsed(&get, "PORT", defaults.relay_port),
            settings_port: parsed(&get, "SETTINGS_PORT", defaults.settings_port),
            bind_addr: parsed(&get, "BIND_ADDR", defaults.bind_addr),
            server_name: get("SERVER_NAME").unwrap_or(defaults.server_name),
            video_path: get("VIDEO_PATH").map(PathBuf::from),
            bus_capacity: parsed(&get, "ES_BUS_CAPACITY", defaults.bus_capacity),
            retry_delay: Duration::from_secs(parsed(
                &get,
                "ES_RETRY_DELAY_SECS",
                defaults.retry_delay.as_secs(),
            )),
            // 0 means the same as unset.
            max_retries: Some(parsed(&get, "ES_MAX_RETRIES", 0u32)).filter(|n| *n > 0),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay_port != 0 && self.relay_port == self.settings_port {
            return Err(ConfigError::SamePort(self.relay_port));
        }
        if self.bus_capacity == 0 {
            return Err(ConfigError::ZeroBusCapacity);
        }
        if self.server_name.trim().is_empty() {
            return Err(ConfigError::EmptyServerName);
        }
        Ok(())
    }

    pub fn relay_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.relay_port)
    }

    pub fn settings_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.settings_port)
    }

    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            capacity: self.bus_capacity,
            ..Default::default()
        }
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig::default().with_server_name(self.server_name.as_str())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: self.retry_delay,
            max_attempts: self.max_retries,
        }
    }
}

fn parsed<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                warn!(key, value = %raw, error = %e, "Unparsable setting, using default");
                default
            }
        },
    }
}
