// Timeline construction
//
// A streaming pass in timeline mode records one sample per row. Once the pass
// completes, the samples are turned into events on a zero-based time axis: the
// first sample sits at 0 s and every other sample at its offset from the first,
// converted from milliseconds to seconds.

use crate::streaming::types::{FieldValue, FieldValueSet};
use serde::{Deserialize, Serialize};

/// Values a sample needs to become an event: pitch, duration, velocity
pub const VALUES_PER_EVENT: usize = 3;

/// One row's values in field-selection order
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSample {
    pub timestamp: i64,
    pub values: Vec<FieldValue>,
}

impl TimelineSample {
    pub fn new(timestamp: i64, values: Vec<FieldValue>) -> Self {
        Self { timestamp, values }
    }

    pub fn from_values(timestamp: i64, values: &FieldValueSet) -> Self {
        Self {
            timestamp,
            values: values.values().cloned().collect(),
        }
    }

    /// Pitch, duration and velocity if the first three values are numeric
    fn event_params(&self) -> Option<[f64; VALUES_PER_EVENT]> {
        if self.values.len() < VALUES_PER_EVENT {
            return None;
        }
        let note = self.values[0].as_number()?;
        let duration = self.values[1].as_number()?;
        let velocity = self.values[2].as_number()?;
        Some([note, duration, velocity])
    }
}

/// One note on the relative timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// Seconds after the start of playback
    pub time: f64,
    /// MIDI note number
    pub note: f64,
    /// Seconds
    pub duration: f64,
    /// MIDI velocity (0..=127)
    pub velocity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub events: Vec<ScheduledEvent>,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// End of the last event's sound, measured from playback start
    pub fn total_duration_secs(&self) -> f64 {
        self.events
            .last()
            .map(|e| e.time + e.duration)
            .unwrap_or(0.0)
    }
}

/// Convert an ordered sample sequence into a relative timeline.
///
/// Samples with fewer than three numeric leading values are dropped.
pub fn build_timeline(samples: &[TimelineSample]) -> Timeline {
    let Some(first) = samples.first() else {
        return Timeline::default();
    };
    let origin = first.timestamp;

    let events = samples
        .iter()
        .filter_map(|sample| {
            let [note, duration, velocity] = sample.event_params()?;
            let time = (sample.timestamp - origin) as f64 / 1000.0;
            Some(ScheduledEvent {
                time: time.max(0.0),
                note,
                duration: duration.max(0.0),
                velocity,
            })
        })
        .collect();

    Timeline { events }
}

/// Accumulates samples during a timeline-mode streaming pass
#[derive(Debug, Default)]
pub struct TimelineRecorder {
    samples: Vec<TimelineSample>,
}

impl TimelineRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, timestamp: i64, values: &FieldValueSet) {
        self.samples.push(TimelineSample::from_values(timestamp, values));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn build(self) -> Timeline {
        build_timeline(&self.samples)
    }
}
