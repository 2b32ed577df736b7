pub mod config;
pub mod mapping;
pub mod playback;
pub mod streaming;
pub mod timeline;

pub use config::{ConfigError, SourceSettings};
pub use mapping::{FieldMapper, FieldRange};
pub use playback::{AudioOutput, LogOutput, NoteEvent, PlaybackHandle, PlaybackScheduler, RecordingOutput};
pub use streaming::{
    OrchestratorConfig, OrchestratorStatus, StreamError, StreamResult, StreamingOrchestrator,
};
pub use timeline::{build_timeline, ScheduledEvent, Timeline, TimelineSample};
