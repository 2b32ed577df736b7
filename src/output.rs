use serde::Serialize;
use sinfonia::streaming::{StreamMode, StreamSummary};
use std::io::Write;
use std::path::Path;

/// JSON summary of one `live` or `timeline` run
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub mode: StreamMode,
    /// completed, stopped, failed, empty, played or cancelled
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<StreamSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Sounds captured by --dry-run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(mode: StreamMode, outcome: &'static str) -> Self {
        Self {
            mode,
            outcome,
            summary: None,
            events: None,
            duration_secs: None,
            triggers: None,
            error: None,
        }
    }
}

/// Write JSON string to stdout or a file.
pub fn write_output(json: &str, output_path: Option<&str>) -> Result<(), String> {
    match output_path {
        Some(path) => std::fs::write(Path::new(path), json)
            .map_err(|e| format!("Failed to write output file '{}': {}", path, e)),
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(json.as_bytes())
                .and_then(|_| handle.write_all(b"\n"))
                .map_err(|e| format!("Failed to write to stdout: {}", e))
        }
    }
}

/// Serialize a value to JSON (pretty or compact).
pub fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<String, String> {
    if compact {
        serde_json::to_string(value).map_err(|e| format!("JSON serialization failed: {}", e))
    } else {
        serde_json::to_string_pretty(value)
            .map_err(|e| format!("JSON serialization failed: {}", e))
    }
}
