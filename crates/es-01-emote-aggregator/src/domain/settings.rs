//! Aggregation settings and their synchronized store.
//!
//! The store is owned by the service root and shared by reference with the
//! ingestor and the HTTP API. Every mutation goes through one validated
//! setter; a rejected value leaves the current settings untouched.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Default flush threshold (events per analysis pass).
pub const DEFAULT_INTERVAL: usize = 100;

/// Default significance threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Emotes accepted out of the box.
pub const DEFAULT_ALLOWED_EMOTES: [&str; 4] = ["❤️", "👍", "😢", "😡"];

/// Rejected configuration value (ConfigurationRejected).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettingsError {
    #[error("Invalid interval value")]
    InvalidInterval,

    #[error("Invalid threshold value")]
    InvalidThreshold,

    #[error("Invalid allowed emotes value")]
    InvalidAllowedEmotes,
}

/// Aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Events buffered before an analysis pass. Always > 0.
    pub interval: usize,
    /// Share of a window an emote must exceed. Strictly inside (0, 1).
    pub threshold: f64,
    /// Emotes that may enter the buffer, in first-seen order without duplicates.
    pub allowed_emotes: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            threshold: DEFAULT_THRESHOLD,
            allowed_emotes: DEFAULT_ALLOWED_EMOTES.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Build validated settings.
    pub fn new(
        interval: usize,
        threshold: f64,
        allowed_emotes: Vec<String>,
    ) -> Result<Self, SettingsError> {
        validate_interval(interval)?;
        validate_threshold(threshold)?;
        Ok(Self {
            interval,
            threshold,
            allowed_emotes: dedup(allowed_emotes),
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_interval(self.interval)?;
        validate_threshold(self.threshold)
    }

    pub fn is_allowed(&self, emote: &str) -> bool {
        self.allowed_emotes.iter().any(|e| e == emote)
    }
}

pub fn validate_interval(interval: usize) -> Result<(), SettingsError> {
    if interval == 0 {
        return Err(SettingsError::InvalidInterval);
    }
    Ok(())
}

/// The valid range is the open interval (0, 1).
pub fn validate_threshold(threshold: f64) -> Result<(), SettingsError> {
    if !threshold.is_finite() || threshold <= 0.0 || threshold >= 1.0 {
        return Err(SettingsError::InvalidThreshold);
    }
    Ok(())
}

fn dedup(emotes: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(emotes.len());
    for emote in emotes {
        if !out.contains(&emote) {
            out.push(emote);
        }
    }
    out
}

/// Process-wide settings behind a single synchronized setter.
///
/// Readers get an immutable `Arc<Settings>` snapshot, so a reader never
/// observes a half-applied update.
#[derive(Debug)]
pub struct SettingsStore {
    current: RwLock<Arc<Settings>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(Settings {
                allowed_emotes: dedup(settings.allowed_emotes),
                ..settings
            })),
        })
    }

    /// Current settings.
    pub fn snapshot(&self) -> Arc<Settings> {
        Arc::clone(&self.current.read())
    }

    pub fn set_interval(&self, interval: usize) -> Result<usize, SettingsError> {
        validate_interval(interval)?;
        self.update(|s| s.interval = interval);
        info!(interval, "Interval updated");
        Ok(interval)
    }

    pub fn set_threshold(&self, threshold: f64) -> Result<f64, SettingsError> {
        validate_threshold(threshold)?;
        self.update(|s| s.threshold = threshold);
        info!(threshold, "Threshold updated");
        Ok(threshold)
    }

    pub fn set_allowed_emotes(&self, emotes: Vec<String>) -> Result<Vec<String>, SettingsError> {
        let emotes = dedup(emotes);
        let applied = emotes.clone();
        self.update(|s| s.allowed_emotes = emotes);
        info!(allowed = ?applied, "Allowed emotes updated");
        Ok(applied)
    }

    /// Replace every field at once; all-or-nothing.
    pub fn replace(&self, settings: Settings) -> Result<Arc<Settings>, SettingsError> {
        settings.validate()?;
        let next = Arc::new(Settings {
            allowed_emotes: dedup(settings.allowed_emotes),
            ..settings
        });
        *self.current.write() = Arc::clone(&next);
        info!(
            interval = next.interval,
            threshold = next.threshold,
            "Settings replaced"
        );
        Ok(next)
    }

    fn update(&self, apply: impl FnOnce(&mut Settings)) {
        let mut guard = self.current.write();
        let mut next = Settings::clone(&guard);
        apply(&mut next);
        *guard = Arc::new(next);
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(Settings::default())),
        }
    }
}
