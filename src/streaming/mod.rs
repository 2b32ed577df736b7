// Row streaming and sonification orchestration
//
// This module pulls measurement rows from a source at a fixed pace and routes
// them either straight to the audio output (live mode) or into a timeline that
// is scheduled once the stream completes (timeline mode).
//
// Architecture:
// - `source`: Trait-based system for pluggable row sources (InfluxDB, File, Memory)
// - `streamer`: Paced, cancellable pull loop with per-field statistics
// - `orchestrator`: Phase tracking, the single stop operation, status reporting
// - `types`: Rows, projected field values, summaries and errors

pub mod orchestrator;
pub mod source;
pub mod streamer;
pub mod types;

pub use orchestrator::{
    OrchestratorConfig, OrchestratorEvent, OrchestratorStatus, Phase, StopAction, StreamMode,
    StreamOutcome, StreamingOrchestrator, TimelineOutcome, NO_FIELDS_MESSAGE,
};
pub use source::{create_source, RowSource, RowSourceConfig};
pub use streamer::{RowStreamer, DEFAULT_PACE};
pub use types::{FieldValue, FieldValueSet, Row, StreamError, StreamResult, StreamSummary};
