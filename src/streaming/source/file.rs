// File-based row source that replays recorded data
//
// Useful for:
// - Testing sonification without an InfluxDB instance
// - Replaying exported query results
// - Demo and development
//
// Pacing is applied by the streamer, so the file is read as fast as rows are pulled.

use super::{parse_timestamp, CsvRowDecoder, RowSource};
use crate::streaming::types::{FieldValue, Row, StreamError, StreamResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Csv,
    JsonLines,
}

impl FileFormat {
    fn from_path(path: &Path) -> StreamResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "jsonl" | "ndjson" => Ok(FileFormat::JsonLines),
            other => Err(StreamError::InvalidConfig(format!(
                "unsupported file type '{}' (expected .csv, .jsonl or .ndjson)",
                other
            ))),
        }
    }
}

pub struct FileRowSource {
    path: PathBuf,
    format: FileFormat,
    lines: Option<Lines<BufReader<File>>>,
    csv: CsvRowDecoder,
    line_number: usize,
}

impl FileRowSource {
    /// Validate the path; the file itself is opened on the first pull
    pub fn open(path: impl Into<PathBuf>) -> StreamResult<Self> {
        let path = path.into();
        let format = FileFormat::from_path(&path)?;
        if !path.exists() {
            return Err(StreamError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )));
        }
        Ok(Self {
            path,
            format,
            lines: None,
            csv: CsvRowDecoder::new(),
            line_number: 0,
        })
    }
}

fn parse_json_line(line: &str, line_number: usize) -> StreamResult<Option<Row>> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value = serde_json::from_str(line)?;
    let serde_json::Value::Object(object) = value else {
        return Err(StreamError::Parse(format!(
            "line {}: expected a JSON object",
            line_number
        )));
    };

    let timestamp = match object.get("_time").or_else(|| object.get("time")) {
        Some(serde_json::Value::String(s)) => parse_timestamp(s)?,
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|v| v as i64))
            .ok_or_else(|| StreamError::Parse(format!("line {}: bad time", line_number)))?,
        _ => {
            return Err(StreamError::Parse(format!(
                "line {}: missing _time",
                line_number
            )))
        }
    };

    let mut row = Row::new(timestamp);
    for (name, value) in object {
        if name == "_time" || name == "time" {
            continue;
        }
        let value = match value {
            serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Number),
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(b)),
            serde_json::Value::String(s) => Some(FieldValue::Text(s)),
            // null, arrays and objects carry nothing playable
            _ => None,
        };
        if let Some(value) = value {
            row.fields.insert(name, value);
        }
    }
    Ok(Some(row))
}

#[async_trait]
impl RowSource for FileRowSource {
    async fn next_row(&mut self) -> StreamResult<Option<Row>> {
        if self.lines.is_none() {
            let file = File::open(&self.path).await?;
            log::info!("Replaying rows from {}", self.path.display());
            self.lines = Some(BufReader::new(file).lines());
        }
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };

        while let Some(line) = lines.next_line().await? {
            self.line_number += 1;
            let row = match self.format {
                FileFormat::Csv => self.csv.push_line(&line)?,
                FileFormat::JsonLines => parse_json_line(&line, self.line_number)?,
            };
            if row.is_some() {
                return Ok(row);
            }
        }
        if self.format == FileFormat::Csv {
            self.csv.finish()?;
        }
        Ok(None)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
