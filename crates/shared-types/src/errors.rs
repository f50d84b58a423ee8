//! Parse errors for inbound payloads.

use thiserror::Error;

/// A payload that could not be turned into a domain value.
///
/// Callers treat every variant as MalformedInput: log it, skip the message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The payload was not valid JSON for the expected record.
    #[error("invalid json: {0}")]
    InvalidJson(String),

    /// The timestamp was not RFC 3339 or a naive ISO 8601 date-time.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The window key was not of the form `YYYY-MM-DDTHH:MM`.
    #[error("invalid window key: {0}")]
    InvalidWindow(String),

    /// A required field was empty.
    #[error("empty field: {0}")]
    EmptyField(&'static str),
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError::InvalidJson(e.to_string())
    }
}
