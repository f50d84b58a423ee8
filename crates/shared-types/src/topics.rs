//! Topic names and message headers used on the bus.

/// Raw reaction events from viewers.
pub const RAW_EMOTE_DATA: &str = "raw-emote-data";

/// Significant moments computed by the aggregator.
pub const AGGREGATED_EMOTE_DATA: &str = "aggregated-emote-data";

/// Raw media chunks from the media source.
pub const VIDEO_STREAM: &str = "video-stream";

/// Header carrying the decimal sequence index of a media chunk.
pub const INDEX_HEADER: &str = "index";

/// Target size of a media chunk in bytes.
pub const CHUNK_SIZE: usize = 50_000;
