//! Server-to-viewer frames.
//!
//! Every frame is a JSON object tagged by `type`:
//!
//! ```text
//! {"type":"welcome","message":"Connected to emote data server","server":"relay"}
//! {"type":"emote","timestamp":"2024-03-01T12:34","emote":"👍","count":3,"totalEmotes":4}
//! {"type":"video","chunk":"<base64>","index":7}
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use shared_types::{MediaChunk, SignificantMoment};

/// Text of the welcome frame.
pub const WELCOME_MESSAGE: &str = "Connected to emote data server";

/// A frame sent to viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    Welcome {
        message: String,
        server: String,
    },
    Emote {
        timestamp: String,
        emote: String,
        count: u64,
        #[serde(rename = "totalEmotes")]
        total_emotes: u64,
    },
    Video {
        /// Base64 (standard alphabet, padded) of the raw chunk bytes.
        chunk: String,
        index: u64,
    },
}

impl Envelope {
    pub fn welcome(server: impl Into<String>) -> Self {
        Envelope::Welcome {
            message: WELCOME_MESSAGE.to_string(),
            server: server.into(),
        }
    }

    pub fn moment(moment: &SignificantMoment) -> Self {
        Envelope::Emote {
            timestamp: moment.window.to_string(),
            emote: moment.emote.clone(),
            count: moment.count,
            total_emotes: moment.total_in_window,
        }
    }

    pub fn chunk(chunk: &MediaChunk) -> Self {
        Envelope::Video {
            chunk: STANDARD.encode(&chunk.payload),
            index: chunk.sequence_index,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Welcome { .. } => "welcome",
            Envelope::Emote { .. } => "emote",
            Envelope::Video { .. } => "video",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
