// AudioOutput backends

use super::{AudioOutput, NoteEvent};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Writes every trigger to the log instead of a sound device
#[derive(Debug, Default)]
pub struct LogOutput;

impl AudioOutput for LogOutput {
    fn play_note(&self, note: &NoteEvent) {
        log::info!(
            "♪ {:.2} Hz for {:.3}s (velocity {:.2})",
            note.frequency,
            note.duration.as_secs_f64(),
            note.velocity
        );
    }

    fn play_chord(&self, frequencies: &[f64], duration: Duration) {
        let freqs: Vec<String> = frequencies.iter().map(|f| format!("{:.2}", f)).collect();
        log::info!(
            "♫ [{}] Hz for {:.3}s",
            freqs.join(", "),
            duration.as_secs_f64()
        );
    }
}

/// A sound handed to a RecordingOutput
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Note { at: Duration, note: NoteEvent },
    Chord { at: Duration, frequencies: Vec<f64>, duration: Duration },
}

impl Trigger {
    /// Offset from the creation of the recording output
    pub fn at(&self) -> Duration {
        match self {
            Trigger::Note { at, .. } | Trigger::Chord { at, .. } => *at,
        }
    }
}

/// Keeps every trigger in memory together with when it happened
#[derive(Debug)]
pub struct RecordingOutput {
    created: Instant,
    triggers: Mutex<Vec<Trigger>>,
}

impl Default for RecordingOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            triggers: Mutex::new(Vec::new()),
        }
    }

    pub fn triggers(&self) -> Vec<Trigger> {
        self.triggers.lock().clone()
    }

    pub fn notes(&self) -> Vec<NoteEvent> {
        self.triggers
            .lock()
            .iter()
            .filter_map(|t| match t {
                Trigger::Note { note, .. } => Some(*note),
                Trigger::Chord { .. } => None,
            })
            .collect()
    }

    pub fn chords(&self) -> Vec<Vec<f64>> {
        self.triggers
            .lock()
            .iter()
            .filter_map(|t| match t {
                Trigger::Chord { frequencies, .. } => Some(frequencies.clone()),
                Trigger::Note { .. } => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.triggers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.lock().is_empty()
    }
}

impl AudioOutput for RecordingOutput {
    fn play_note(&self, note: &NoteEvent) {
        let at = self.created.elapsed();
        self.triggers.lock().push(Trigger::Note { at, note: *note });
    }

    fn play_chord(&self, frequencies: &[f64], duration: Duration) {
        let at = self.created.elapsed();
        self.triggers.lock().push(Trigger::Chord {
            at,
            frequencies: frequencies.to_vec(),
            duration,
        });
    }
}
