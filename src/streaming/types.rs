// Common types for the streaming module

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Result type for streaming operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur during streaming operations
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("No fields selected")]
    NoFieldsSelected,

    #[error("Stream already running")]
    AlreadyRunning,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A single field value as delivered by the time-series source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value. NaN counts as non-numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    /// Type a raw text cell: numbers first, then booleans, then plain text
    pub fn parse_cell(raw: &str) -> Self {
        if let Ok(v) = raw.parse::<f64>() {
            return FieldValue::Number(v);
        }
        match raw {
            "true" => FieldValue::Bool(true),
            "false" => FieldValue::Bool(false),
            _ => FieldValue::Text(raw.to_string()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

/// One timestamped record from the source.
///
/// `timestamp` is in milliseconds since the Unix epoch. Null cells are never
/// stored; a missing key means the field was absent or null in that row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub timestamp: i64,
    pub fields: HashMap<String, FieldValue>,
}

impl Row {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// Projection of a row onto the selected fields, in selection order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValueSet {
    entries: Vec<(String, FieldValue)>,
}

impl FieldValueSet {
    /// Keep only selected fields that are present in the row
    pub fn project(row: &Row, selected: &[String]) -> Self {
        let entries = selected
            .iter()
            .filter_map(|field| {
                row.get(field)
                    .map(|value| (field.clone(), value.clone()))
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Counters accumulated over one streaming pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSummary {
    pub total_rows: u64,
    pub rows_by_field: BTreeMap<String, u64>,
}

impl StreamSummary {
    /// Summary with a zero counter for every selected field
    pub fn for_fields(selected: &[String]) -> Self {
        Self {
            total_rows: 0,
            rows_by_field: selected.iter().map(|f| (f.clone(), 0)).collect(),
        }
    }

    pub(crate) fn record(&mut self, values: &FieldValueSet) {
        self.total_rows += 1;
        for (field, _) in values.iter() {
            if let Some(count) = self.rows_by_field.get_mut(field) {
                *count += 1;
            }
        }
    }
}
