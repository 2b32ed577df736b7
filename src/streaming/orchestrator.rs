// Streaming orchestrator - coordinates fetching rows and playing them
//
// The orchestrator manages:
// - Input validation (a field selection is required)
// - Live mode: every streamed row is played immediately as a chord
// - Timeline mode: rows are recorded, turned into a timeline when the stream
//   completes, and handed to the playback scheduler
// - A single stop operation whose meaning depends on the current phase
// - State reporting to the UI layer
//
// Phases: Idle -> Fetching(Live | Timeline) -> Idle, or
//         Idle -> Fetching(Timeline) -> Playing -> Idle

use super::source::RowSource;
use super::streamer::{RowStreamer, DEFAULT_PACE};
use super::types::{StreamError, StreamResult, StreamSummary};
use crate::mapping::{FieldMapper, CHORD_DURATION};
use crate::playback::{AudioOutput, PlaybackHandle, PlaybackScheduler, PlaybackState, COMPLETION_MARGIN};
use crate::timeline::TimelineRecorder;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shown to the user when nothing is selected
pub const NO_FIELDS_MESSAGE: &str = "Please select at least one field to stream measurements.";

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay between streamed rows
    pub pace: Duration,
    /// Length of each live chord
    pub chord_duration: Duration,
    /// Wait after the last timeline sound before playback is complete
    pub completion_margin: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pace: DEFAULT_PACE,
            chord_duration: CHORD_DURATION,
            completion_margin: COMPLETION_MARGIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    Live,
    Timeline,
}

/// What the orchestrator is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "mode", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Fetching(StreamMode),
    Playing,
}

/// State exposed to the UI
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStatus {
    pub is_streaming: bool,
    pub is_scheduling: bool,
    pub is_playing_timeline: bool,
    pub error: Option<String>,
}

/// Effect of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAction {
    /// Nothing was running
    Nothing,
    /// The fetch loop will end at its next poll
    FetchStopped(StreamMode),
    /// The scheduled timeline was cancelled
    PlaybackCancelled,
}

/// Result of a live-mode run
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    Completed(StreamSummary),
    Stopped(StreamSummary),
    Failed(String),
}

/// Result of a timeline-mode run
#[derive(Debug, Clone)]
pub enum TimelineOutcome {
    /// Stream completed and the timeline is playing
    Scheduled {
        summary: StreamSummary,
        handle: PlaybackHandle,
        events: usize,
        duration_secs: f64,
    },
    /// Stream completed but no sample qualified as an event
    Empty(StreamSummary),
    /// Stopped during the fetch; recorded samples were discarded
    Stopped(StreamSummary),
    Failed(String),
}

/// Events emitted by the orchestrator
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    StatusChanged(OrchestratorStatus),
    PlaybackFinished(PlaybackState),
}

type EventCallback = Arc<RwLock<Option<Box<dyn Fn(OrchestratorEvent) + Send + Sync>>>>;

#[derive(Debug)]
enum ActivePhase {
    Idle,
    Fetching {
        mode: StreamMode,
        stop: CancellationToken,
    },
    Playing {
        handle: PlaybackHandle,
    },
}

#[derive(Debug)]
struct Shared {
    phase: ActivePhase,
    error: Option<String>,
}

impl Shared {
    fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            is_streaming: matches!(
                self.phase,
                ActivePhase::Fetching {
                    mode: StreamMode::Live,
                    ..
                }
            ),
            is_scheduling: matches!(
                self.phase,
                ActivePhase::Fetching {
                    mode: StreamMode::Timeline,
                    ..
                }
            ),
            is_playing_timeline: matches!(self.phase, ActivePhase::Playing { .. }),
            error: self.error.clone(),
        }
    }
}

fn emit(callback: &EventCallback, event: OrchestratorEvent) {
    if let Some(callback) = callback.read().as_ref() {
        callback(event);
    }
}

fn log_summary(summary: &StreamSummary) {
    for (field, count) in &summary.rows_by_field {
        if *count > 0 {
            log::info!("  {}: {} rows", field, count);
        }
    }
}

pub struct StreamingOrchestrator {
    config: OrchestratorConfig,
    mapper: FieldMapper,
    output: Arc<dyn AudioOutput>,
    scheduler: PlaybackScheduler,
    shared: Arc<Mutex<Shared>>,
    event_callback: EventCallback,
}

impl StreamingOrchestrator {
    pub fn new(config: OrchestratorConfig, mapper: FieldMapper, output: Arc<dyn AudioOutput>) -> Self {
        let scheduler =
            PlaybackScheduler::new(Arc::clone(&output)).with_margin(config.completion_margin);
        Self {
            config,
            mapper,
            output,
            scheduler,
            shared: Arc::new(Mutex::new(Shared {
                phase: ActivePhase::Idle,
                error: None,
            })),
            event_callback: Arc::new(RwLock::new(None)),
        }
    }

    /// Set event callback function
    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: Fn(OrchestratorEvent) + Send + Sync + 'static,
    {
        *self.event_callback.write() = Some(Box::new(callback));
    }

    pub fn mapper(&self) -> &FieldMapper {
        &self.mapper
    }

    pub fn status(&self) -> OrchestratorStatus {
        self.shared.lock().status()
    }

    pub fn phase(&self) -> Phase {
        match &self.shared.lock().phase {
            ActivePhase::Idle => Phase::Idle,
            ActivePhase::Fetching { mode, .. } => Phase::Fetching(*mode),
            ActivePhase::Playing { .. } => Phase::Playing,
        }
    }

    /// Handle of the timeline currently playing
    pub fn playback_handle(&self) -> Option<PlaybackHandle> {
        match &self.shared.lock().phase {
            ActivePhase::Playing { handle } => Some(handle.clone()),
            _ => None,
        }
    }

    fn emit_status(&self) {
        let status = self.status();
        emit(&self.event_callback, OrchestratorEvent::StatusChanged(status));
    }

    /// Validate the selection and enter the fetching phase
    fn begin_fetch(&self, mode: StreamMode, fields: &[String]) -> StreamResult<CancellationToken> {
        let token = {
            let mut shared = self.shared.lock();
            if !matches!(shared.phase, ActivePhase::Idle) {
                // The running stream keeps its status
                return Err(StreamError::AlreadyRunning);
            } else if fields.is_empty() {
                shared.error = Some(NO_FIELDS_MESSAGE.to_string());
                None
            } else {
                let token = CancellationToken::new();
                shared.phase = ActivePhase::Fetching {
                    mode,
                    stop: token.clone(),
                };
                shared.error = None;
                Some(token)
            }
        };
        self.emit_status();

        match token {
            Some(token) => {
                log::info!(
                    "Starting {:?} stream for {} fields: {}",
                    mode,
                    fields.len(),
                    fields.join(", ")
                );
                Ok(token)
            }
            None => {
                log::error!("Cannot stream: No fields selected");
                Err(StreamError::NoFieldsSelected)
            }
        }
    }

    /// Leave the fetching phase, recording a failure message if there was one
    fn end_fetch(&self, error: Option<String>) {
        {
            let mut shared = self.shared.lock();
            if matches!(shared.phase, ActivePhase::Fetching { .. }) {
                shared.phase = ActivePhase::Idle;
            }
            if let Some(message) = error {
                log::error!("{}", message);
                shared.error = Some(message);
            }
        }
        self.emit_status();
    }

    /// Stream rows and play each one as a chord.
    ///
    /// Returns `Err` only when the stream could not start.
    pub async fn start_live(
        &self,
        source: &mut dyn RowSource,
        fields: &[String],
    ) -> StreamResult<StreamOutcome> {
        let stop = self.begin_fetch(StreamMode::Live, fields)?;
        log::info!("Source: {}", source.describe());

        let mapper = &self.mapper;
        let output = &self.output;
        let chord_duration = self.config.chord_duration;

        let result = RowStreamer::new(self.config.pace)
            .stream(source, fields, &stop, |values, _row| {
                let chord = mapper.chord(values);
                if !chord.is_empty() {
                    output.play_chord(&chord, chord_duration);
                }
            })
            .await;

        let outcome = match result {
            Ok(summary) if stop.is_cancelled() => {
                log::info!("Stream stopped by user. Processed {} rows.", summary.total_rows);
                StreamOutcome::Stopped(summary)
            }
            Ok(summary) => StreamOutcome::Completed(summary),
            Err(e) => StreamOutcome::Failed(format!("Failed to stream measurements: {}", e)),
        };

        match &outcome {
            StreamOutcome::Completed(summary) | StreamOutcome::Stopped(summary) => {
                log_summary(summary);
                self.end_fetch(None);
            }
            StreamOutcome::Failed(message) => self.end_fetch(Some(message.clone())),
        }

        Ok(outcome)
    }

    /// Stream rows into a timeline and schedule it once the stream completes.
    ///
    /// A stop during the fetch discards the recorded samples and nothing is
    /// scheduled. Returns `Err` only when the stream could not start.
    pub async fn start_timeline(
        &self,
        source: &mut dyn RowSource,
        fields: &[String],
    ) -> StreamResult<TimelineOutcome> {
        let stop = self.begin_fetch(StreamMode::Timeline, fields)?;
        log::info!("Source: {}", source.describe());

        let mut recorder = TimelineRecorder::new();
        let result = RowStreamer::new(self.config.pace)
            .stream(source, fields, &stop, |values, row| {
                recorder.record(row.timestamp, values)
            })
            .await;

        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                let message = format!("Failed to stream measurements: {}", e);
                self.end_fetch(Some(message.clone()));
                return Ok(TimelineOutcome::Failed(message));
            }
        };
        log_summary(&summary);

        if stop.is_cancelled() {
            log::info!(
                "Stream stopped by user. Discarding {} recorded samples.",
                recorder.len()
            );
            self.end_fetch(None);
            return Ok(TimelineOutcome::Stopped(summary));
        }

        let timeline = recorder.build();
        if timeline.is_empty() {
            log::info!("No sample has three numeric values; nothing to schedule");
            self.end_fetch(None);
            return Ok(TimelineOutcome::Empty(summary));
        }

        let events = timeline.len();
        let duration_secs = timeline.total_duration_secs();
        let on_complete = {
            let shared = Arc::clone(&self.shared);
            let callback = Arc::clone(&self.event_callback);
            move || {
                let status = {
                    let mut shared = shared.lock();
                    // Only the playback that just completed may reset the phase
                    if let ActivePhase::Playing { handle } = &shared.phase {
                        if handle.state() == PlaybackState::Completed {
                            shared.phase = ActivePhase::Idle;
                        }
                    }
                    shared.status()
                };
                log::info!("Timeline playback completed");
                emit(&callback, OrchestratorEvent::PlaybackFinished(PlaybackState::Completed));
                emit(&callback, OrchestratorEvent::StatusChanged(status));
            }
        };

        let handle = {
            let mut shared = self.shared.lock();
            // A stop that raced with the end of the stream still wins
            if stop.is_cancelled() {
                shared.phase = ActivePhase::Idle;
                None
            } else {
                let handle = self.scheduler.schedule(timeline, on_complete);
                shared.phase = ActivePhase::Playing {
                    handle: handle.clone(),
                };
                Some(handle)
            }
        };
        self.emit_status();

        match handle {
            Some(handle) => Ok(TimelineOutcome::Scheduled {
                summary,
                handle,
                events,
                duration_secs,
            }),
            None => Ok(TimelineOutcome::Stopped(summary)),
        }
    }

    /// Stop whatever is running: the fetch loop while rows are being pulled,
    /// the scheduled timeline while it plays.
    pub fn stop(&self) -> StopAction {
        let action = {
            let mut shared = self.shared.lock();
            let action = match &shared.phase {
                ActivePhase::Idle => StopAction::Nothing,
                ActivePhase::Fetching { mode, stop } => {
                    stop.cancel();
                    StopAction::FetchStopped(*mode)
                }
                ActivePhase::Playing { handle } => {
                    // A playback that already completed just leaves the phase
                    if handle.cancel() {
                        StopAction::PlaybackCancelled
                    } else {
                        StopAction::Nothing
                    }
                }
            };
            if matches!(shared.phase, ActivePhase::Playing { .. }) {
                shared.phase = ActivePhase::Idle;
            }
            action
        };

        match action {
            StopAction::Nothing => {}
            StopAction::FetchStopped(_) => log::info!("Stopping stream..."),
            StopAction::PlaybackCancelled => {
                log::info!("Timeline playback stopped by user");
                emit(
                    &self.event_callback,
                    OrchestratorEvent::PlaybackFinished(PlaybackState::Cancelled),
                );
                self.emit_status();
            }
        }
        action
    }

    /// Stop a live stream; no effect in any other phase
    pub fn stop_live(&self) -> StopAction {
        match self.phase() {
            Phase::Fetching(StreamMode::Live) => self.stop(),
            _ => StopAction::Nothing,
        }
    }

    /// Stop a timeline fetch or its playback; no effect in any other phase
    pub fn stop_timeline(&self) -> StopAction {
        match self.phase() {
            Phase::Fetching(StreamMode::Timeline) | Phase::Playing => self.stop(),
            _ => StopAction::Nothing,
        }
    }
}

impl Drop for StreamingOrchestrator {
    fn drop(&mut self) {
        if let ActivePhase::Fetching { stop, .. } = &self.shared.lock().phase {
            stop.cancel();
        }
        self.scheduler.cancel_all();
    }
}
