// Field value -> audio parameter mapping
//
// Each sensor field has an expected value range and a base frequency. A value is
// normalized into [0, 1] inside its range and mapped exponentially across one
// octave above the base frequency, so equal relative changes in the sensor sound
// like equal pitch steps.

use crate::streaming::types::{FieldValue, FieldValueSet, StreamError, StreamResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Fields that describe the row rather than the measurement
pub const EXCLUDED_FIELDS: &[&str] = &["measurement", "timestamp", "_time", "_measurement"];

/// Duration of a live chord: a sixteenth note at 120 BPM
pub const CHORD_DURATION: Duration = Duration::from_millis(125);

/// Expected range and base frequency of one field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
    pub base_frequency: f64,
}

impl FieldRange {
    pub const fn new(min: f64, max: f64, base_frequency: f64) -> Self {
        Self {
            min,
            max,
            base_frequency,
        }
    }

    /// Entry used for fields without explicit configuration (A3)
    pub const DEFAULT: FieldRange = FieldRange::new(0.0, 100.0, 220.0);

    fn validate(&self, field: &str) -> StreamResult<()> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min >= self.max {
            return Err(StreamError::InvalidConfig(format!(
                "field '{}': min must be below max",
                field
            )));
        }
        if !(self.base_frequency.is_finite() && self.base_frequency > 0.0) {
            return Err(StreamError::InvalidConfig(format!(
                "field '{}': base frequency must be positive",
                field
            )));
        }
        Ok(())
    }
}

/// Normalize a value into [0, 1], saturating outside the range
pub fn normalize_value(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return if value >= max { 1.0 } else { 0.0 };
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Map a normalized value onto `octaves` octaves above `base_frequency`
pub fn value_to_frequency(normalized: f64, base_frequency: f64, octaves: f64) -> f64 {
    base_frequency * 2f64.powf(normalized * octaves)
}

/// Convert a MIDI note number to Hz. Out-of-range notes are clamped to 0..=127.
pub fn midi_to_frequency(note: f64) -> f64 {
    let note = note.clamp(0.0, 127.0);
    440.0 * 2f64.powf((note - 69.0) / 12.0)
}

/// Maps sensor fields to frequencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapper {
    ranges: BTreeMap<String, FieldRange>,
}

impl Default for FieldMapper {
    /// Built-in table for the environmental sensor station (C4 major scale roots)
    fn default() -> Self {
        let ranges = [
            ("temperatura", FieldRange::new(0.0, 50.0, 261.63)),
            ("humedad", FieldRange::new(0.0, 100.0, 329.63)),
            ("presion", FieldRange::new(90000.0, 105000.0, 392.0)),
            ("gas", FieldRange::new(0.0, 100000.0, 440.0)),
            ("altitud", FieldRange::new(0.0, 2000.0, 493.88)),
            ("infrarrojo", FieldRange::new(0.0, 1000.0, 523.25)),
            ("visible_ir", FieldRange::new(0.0, 1000.0, 587.33)),
        ]
        .into_iter()
        .map(|(name, range)| (name.to_string(), range))
        .collect();
        Self { ranges }
    }
}

impl FieldMapper {
    pub fn new(ranges: BTreeMap<String, FieldRange>) -> StreamResult<Self> {
        for (field, range) in &ranges {
            range.validate(field)?;
        }
        Ok(Self { ranges })
    }

    /// Load a `{ "field": { "min": .., "max": .., "baseFrequency": .. } }` table
    pub fn from_json_file(path: &Path) -> StreamResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let ranges: BTreeMap<String, FieldRange> = serde_json::from_str(&content)?;
        Self::new(ranges)
    }

    pub fn range_for(&self, field: &str) -> FieldRange {
        self.ranges.get(field).copied().unwrap_or(FieldRange::DEFAULT)
    }

    pub fn ranges(&self) -> impl Iterator<Item = (&str, &FieldRange)> {
        self.ranges.iter().map(|(name, range)| (name.as_str(), range))
    }

    pub fn is_excluded(field: &str) -> bool {
        EXCLUDED_FIELDS.contains(&field)
    }

    /// Frequency for one field value, or `None` if the value is not playable
    pub fn frequency(&self, field: &str, value: &FieldValue) -> Option<f64> {
        if Self::is_excluded(field) {
            return None;
        }
        let value = value.as_number()?;
        let range = self.range_for(field);
        let normalized = normalize_value(value, range.min, range.max);
        Some(value_to_frequency(normalized, range.base_frequency, 1.0))
    }

    /// Frequencies to play together for one row
    pub fn chord(&self, values: &FieldValueSet) -> Vec<f64> {
        values
            .iter()
            .filter_map(|(field, value)| self.frequency(field, value))
            .collect()
    }
}
