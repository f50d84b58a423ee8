//! # Bus Messages
//!
//! A message is a topic, a small header map and an opaque payload.

use bytes::Bytes;
use std::collections::BTreeMap;

/// A single message on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// String headers (e.g. the media chunk `index`).
    pub headers: BTreeMap<String, String>,
    /// Raw payload.
    pub payload: Bytes,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            headers: BTreeMap::new(),
            payload: payload.into(),
        }
    }

    /// Attach a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.headers.insert(key.into(), value.to_string());
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

/// Which topics a subscription receives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    /// Topics to include. Empty = all topics.
    pub topics: Vec<String>,
}

impl TopicFilter {
    /// Receive everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Receive only the listed topics.
    pub fn topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, message: &BusMessage) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| *t == message.topic)
    }
}
