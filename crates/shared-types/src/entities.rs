//! # Core Domain Entities
//!
//! Reaction events, minute windows, significant moments and media chunks.

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ParseError;

/// Format of a window key on the wire: minute resolution, no seconds.
pub const WINDOW_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// A single viewer reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// The emote symbol, e.g. `"❤️"`.
    pub emote: String,
    /// When the reaction happened (UTC).
    pub occurred_at: DateTime<Utc>,
}

impl ReactionEvent {
    pub fn new(emote: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            emote: emote.into(),
            occurred_at,
        }
    }

    /// The minute window this event falls into.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::containing(self.occurred_at)
    }
}

/// Minute-granularity bucket key.
///
/// Many `ReactionEvent`s map to one window. Ordering follows time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeWindow(NaiveDateTime);

impl TimeWindow {
    /// Truncate a timestamp to the start of its minute.
    pub fn containing(at: DateTime<Utc>) -> Self {
        let naive = at.naive_utc();
        let start = naive
            .date()
            .and_hms_opt(naive.hour(), naive.minute(), 0)
            .unwrap_or(naive);
        Self(start)
    }

    /// Start of the window as a UTC instant.
    pub fn start(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.0)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(WINDOW_FORMAT))
    }
}

impl FromStr for TimeWindow {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDateTime::parse_from_str(s, WINDOW_FORMAT)
            .map(|dt| Self::containing(Utc.from_utc_datetime(&dt)))
            .map_err(|_| ParseError::InvalidWindow(s.to_string()))
    }
}

/// A (window, emote) pair whose share of the window exceeded the threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignificantMoment {
    pub window: TimeWindow,
    pub emote: String,
    /// Occurrences of `emote` in the window.
    pub count: u64,
    /// Occurrences of every emote in the window.
    pub total_in_window: u64,
}

impl SignificantMoment {
    /// Share of the window taken by this emote.
    pub fn ratio(&self) -> f64 {
        if self.total_in_window == 0 {
            return 0.0;
        }
        self.count as f64 / self.total_in_window as f64
    }
}

/// One chunk of the live media stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    /// Position in the current stream cycle; restarts at 0 on loop.
    pub sequence_index: u64,
    pub payload: Bytes,
}

impl MediaChunk {
    pub fn new(sequence_index: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence_index,
            payload: payload.into(),
        }
    }
}

/// Parse an event timestamp.
///
/// Accepts RFC 3339 with any offset (normalised to UTC) and naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]`, which is read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| ParseError::InvalidTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn test_window_truncates_to_minute() {
        let w = TimeWindow::containing(at("2024-03-01T12:34:56.789Z"));
        assert_eq!(w.to_string(), "2024-03-01T12:34");
    }

    #[test]
    fn test_events_in_same_minute_share_window() {
        let a = ReactionEvent::new("❤️", at("2024-03-01T12:34:00Z"));
        let b = ReactionEvent::new("👍", at("2024-03-01T12:34:59.999Z"));
        let c = ReactionEvent::new("👍", at("2024-03-01T12:35:00Z"));
        assert_eq!(a.window(), b.window());
        assert_ne!(b.window(), c.window());
    }

    #[test]
    fn test_offset_timestamp_normalised_to_utc() {
        let w = TimeWindow::containing(at("2024-03-01T14:34:10+02:00"));
        assert_eq!(w.to_string(), "2024-03-01T12:34");
    }

    #[test]
    fn test_naive_timestamp_read_as_utc() {
        let w = TimeWindow::containing(at("2024-03-01T12:34:10.5"));
        assert_eq!(w.to_string(), "2024-03-01T12:34");
    }

    #[test]
    fn test_invalid_timestamp() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(ParseError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_window_parses_back() {
        let w: TimeWindow = "2024-03-01T12:34".parse().unwrap();
        assert_eq!(w, TimeWindow::containing(at("2024-03-01T12:34:30Z")));
        assert!("2024-03-01".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn test_moment_ratio() {
        let m = SignificantMoment {
            window: TimeWindow::containing(Utc::now()),
            emote: "A".into(),
            count: 3,
            total_in_window: 4,
        };
        assert!((m.ratio() - 0.75).abs() < f64::EPSILON);
    }
}
