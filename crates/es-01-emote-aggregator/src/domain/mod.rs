//! Domain layer: pure aggregation logic.

pub mod analyzer;
pub mod ingestor;
pub mod settings;

pub use analyzer::{SignificanceAnalyzer, WindowTally};
pub use ingestor::{EventIngestor, IngestOutcome};
pub use settings::{Settings, SettingsError, SettingsStore};
