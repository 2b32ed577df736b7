// Playback: audio output seam and timeline scheduling
//
// The synthesizer is not part of this crate. Everything that makes sound goes
// through the `AudioOutput` trait, which only needs "play this note now" and
// "play these frequencies together now". Timing is done by the scheduler.

pub mod output;
pub mod scheduler;

use crate::mapping::midi_to_frequency;
use crate::timeline::ScheduledEvent;
use serde::Serialize;
use std::time::Duration;

pub use output::{LogOutput, RecordingOutput, Trigger};
pub use scheduler::{PlaybackHandle, PlaybackScheduler, PlaybackState, COMPLETION_MARGIN};

/// Fallback for notes without a usable duration
const MIN_NOTE_DURATION: Duration = Duration::from_millis(100);

/// Playable note parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoteEvent {
    /// Hz
    pub frequency: f64,
    pub duration: Duration,
    /// 0.0..=1.0
    pub velocity: f64,
}

impl From<&ScheduledEvent> for NoteEvent {
    fn from(event: &ScheduledEvent) -> Self {
        let duration = if event.duration.is_finite() && event.duration > 0.0 {
            Duration::from_secs_f64(event.duration)
        } else {
            MIN_NOTE_DURATION
        };
        let velocity = if event.velocity.is_finite() {
            (event.velocity / 127.0).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            frequency: midi_to_frequency(event.note),
            duration,
            velocity,
        }
    }
}

/// Sink for triggered sounds
pub trait AudioOutput: Send + Sync {
    /// Start a single note immediately
    fn play_note(&self, note: &NoteEvent);

    /// Start several frequencies at once
    fn play_chord(&self, frequencies: &[f64], duration: Duration);
}
