//! # Shared Types Crate
//!
//! Domain values and wire records shared by the aggregator, the relay and the
//! media source.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every value that crosses a topic is defined here.
//! - **Immutable Events**: `ReactionEvent`, `SignificantMoment` and `MediaChunk`
//!   are never mutated after construction.
//! - **Wire vs Domain**: JSON records (`RawEmoteRecord`, `AggregatedEmoteRecord`)
//!   are kept apart from the typed domain values and converted at the edge.

pub mod entities;
pub mod errors;
pub mod topics;
pub mod wire;

pub use entities::*;
pub use errors::*;
pub use wire::*;
