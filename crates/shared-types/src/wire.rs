//! # Wire Records
//!
//! JSON shapes carried on the topics:
//!
//! - `raw-emote-data`: `{ "emote": string, "timestamp": ISO 8601 }`
//! - `aggregated-emote-data`: `{ "timestamp": "YYYY-MM-DDTHH:MM", "emote",
//!   "count", "totalEmotes" }`

use serde::{Deserialize, Serialize};

use crate::entities::{parse_timestamp, ReactionEvent, SignificantMoment, TimeWindow};
use crate::errors::ParseError;

/// Inbound reaction as produced by upstream clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEmoteRecord {
    pub emote: String,
    pub timestamp: String,
}

impl RawEmoteRecord {
    pub fn from_event(event: &ReactionEvent) -> Self {
        Self {
            emote: event.emote.clone(),
            timestamp: event.occurred_at.to_rfc3339(),
        }
    }

    /// Decode a JSON payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self, ParseError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Validate and convert into a domain event.
    pub fn into_event(self) -> Result<ReactionEvent, ParseError> {
        if self.emote.is_empty() {
            return Err(ParseError::EmptyField("emote"));
        }
        let occurred_at = parse_timestamp(&self.timestamp)?;
        Ok(ReactionEvent::new(self.emote, occurred_at))
    }
}

/// Outbound significant moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedEmoteRecord {
    /// Minute-truncated window key.
    pub timestamp: String,
    pub emote: String,
    pub count: u64,
    #[serde(rename = "totalEmotes")]
    pub total_emotes: u64,
}

impl AggregatedEmoteRecord {
    pub fn from_slice(payload: &[u8]) -> Result<Self, ParseError> {
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn into_moment(self) -> Result<SignificantMoment, ParseError> {
        if self.emote.is_empty() {
            return Err(ParseError::EmptyField("emote"));
        }
        let window: TimeWindow = self.timestamp.parse()?;
        Ok(SignificantMoment {
            window,
            emote: self.emote,
            count: self.count,
            total_in_window: self.total_emotes,
        })
    }
}

impl From<&SignificantMoment> for AggregatedEmoteRecord {
    fn from(moment: &SignificantMoment) -> Self {
        Self {
            timestamp: moment.window.to_string(),
            emote: moment.emote.clone(),
            count: moment.count,
            total_emotes: moment.total_in_window,
        }
    }
}
