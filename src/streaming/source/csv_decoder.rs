// Line-oriented CSV decoder for query results
//
// InfluxDB returns query results as CSV: optional `#` annotation lines, then a
// header and data rows per table, tables separated by an empty line. The same
// layout is accepted for local CSV files, so both sources share this decoder.

use crate::streaming::types::{FieldValue, Row, StreamError, StreamResult};

const TIME_COLUMNS: &[&str] = &["_time", "time"];
const METADATA_COLUMNS: &[&str] = &["", "result", "table"];

/// Parse a timestamp cell: RFC 3339 or integer milliseconds
pub fn parse_timestamp(raw: &str) -> StreamResult<i64> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<i64>() {
        return Ok(millis);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| StreamError::Parse(format!("invalid timestamp '{}': {}", raw, e)))
}

#[derive(Debug, Clone)]
enum Column {
    Time,
    Metadata,
    Field(String),
}

/// One logical line of CSV input
#[derive(Debug, Clone, PartialEq)]
pub enum CsvRecord {
    /// Empty line between tables
    TableBreak,
    Cells(Vec<String>),
}

/// Joins physical lines into records; a quoted cell may span several lines.
#[derive(Debug, Default)]
pub struct CsvRecordReader {
    line_number: usize,
    /// Record text while a quoted cell is open
    partial: Option<String>,
}

impl CsvRecordReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Physical lines seen so far
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn push_line(&mut self, line: &str) -> StreamResult<Option<CsvRecord>> {
        self.line_number += 1;
        let line = line.trim_end_matches(['\r', '\n']);

        let record = match self.partial.take() {
            Some(mut record) => {
                record.push('\n');
                record.push_str(line);
                record
            }
            None => {
                if line.trim().is_empty() {
                    return Ok(Some(CsvRecord::TableBreak));
                }
                if line.starts_with('#') {
                    return Ok(None);
                }
                line.to_string()
            }
        };

        if has_open_quote(&record) {
            self.partial = Some(record);
            return Ok(None);
        }
        split_record(&record).map(|cells| Some(CsvRecord::Cells(cells)))
    }

    /// End of input; fails if a quoted cell was never closed
    pub fn finish(&mut self) -> StreamResult<()> {
        match self.partial.take() {
            Some(_) => Err(StreamError::Parse(format!(
                "line {}: unterminated quoted cell",
                self.line_number
            ))),
            None => Ok(()),
        }
    }
}

fn is_error_header(cells: &[String]) -> bool {
    cells.iter().find(|c| !c.is_empty()).map(String::as_str) == Some("error")
}

fn error_message(cells: Vec<String>) -> StreamError {
    let message = cells
        .into_iter()
        .find(|c| !c.is_empty())
        .unwrap_or_else(|| "unknown query error".to_string());
    StreamError::Query(message)
}

#[derive(Debug, Default)]
pub struct CsvRowDecoder {
    reader: CsvRecordReader,
    columns: Option<Vec<Column>>,
    error_table: bool,
}

impl CsvRowDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns a row when the line completed a data row
    pub fn push_line(&mut self, line: &str) -> StreamResult<Option<Row>> {
        match self.reader.push_line(line)? {
            None => Ok(None),
            Some(CsvRecord::TableBreak) => {
                // Next non-annotation line is a new header
                self.columns = None;
                self.error_table = false;
                Ok(None)
            }
            Some(CsvRecord::Cells(cells)) => self.decode_cells(cells),
        }
    }

    pub fn finish(&mut self) -> StreamResult<()> {
        self.reader.finish()
    }

    fn decode_cells(&mut self, cells: Vec<String>) -> StreamResult<Option<Row>> {
        let line_number = self.reader.line_number();
        let Some(columns) = &self.columns else {
            self.set_header(&cells)?;
            return Ok(None);
        };

        if self.error_table {
            return Err(error_message(cells));
        }

        if cells.len() != columns.len() {
            return Err(StreamError::Parse(format!(
                "line {}: expected {} columns, found {}",
                line_number,
                columns.len(),
                cells.len()
            )));
        }

        let mut timestamp = None;
        let mut row_fields = Vec::new();
        for (column, cell) in columns.iter().zip(cells) {
            match column {
                Column::Time => timestamp = Some(parse_timestamp(&cell)?),
                Column::Metadata => {}
                Column::Field(name) => {
                    // Empty cell means null
                    if !cell.is_empty() {
                        row_fields.push((name.clone(), FieldValue::parse_cell(&cell)));
                    }
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            StreamError::Parse(format!("line {}: missing timestamp", line_number))
        })?;

        let mut row = Row::new(timestamp);
        row.fields.extend(row_fields);
        Ok(Some(row))
    }

    fn set_header(&mut self, cells: &[String]) -> StreamResult<()> {
        if is_error_header(cells) {
            self.error_table = true;
            self.columns = Some(vec![Column::Metadata; cells.len()]);
            return Ok(());
        }

        if !cells.iter().any(|c| TIME_COLUMNS.contains(&c.as_str())) {
            return Err(StreamError::Parse(format!(
                "line {}: header has no _time column",
                self.reader.line_number()
            )));
        }

        let columns = cells
            .iter()
            .map(|name| {
                if TIME_COLUMNS.contains(&name.as_str()) {
                    Column::Time
                } else if METADATA_COLUMNS.contains(&name.as_str()) || name.starts_with('_') {
                    Column::Metadata
                } else {
                    Column::Field(name.clone())
                }
            })
            .collect();
        self.columns = Some(columns);
        Ok(())
    }
}

/// Reads the `_value` column of schema query results.
///
/// Schema functions return one table per key with the key in `_value`.
#[derive(Debug, Default)]
pub struct ValueColumnDecoder {
    reader: CsvRecordReader,
    value_column: Option<usize>,
    error_table: bool,
}

impl ValueColumnDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns the value when the line completed a data row
    pub fn push_line(&mut self, line: &str) -> StreamResult<Option<String>> {
        let cells = match self.reader.push_line(line)? {
            None => return Ok(None),
            Some(CsvRecord::TableBreak) => {
                self.value_column = None;
                self.error_table = false;
                return Ok(None);
            }
            Some(CsvRecord::Cells(cells)) => cells,
        };

        if self.error_table {
            return Err(error_message(cells));
        }
        let Some(index) = self.value_column else {
            if is_error_header(&cells) {
                self.error_table = true;
                return Ok(None);
            }
            let index = cells.iter().position(|c| c == "_value").ok_or_else(|| {
                StreamError::Parse(format!(
                    "line {}: header has no _value column",
                    self.reader.line_number()
                ))
            })?;
            self.value_column = Some(index);
            return Ok(None);
        };

        Ok(cells.into_iter().nth(index).filter(|v| !v.is_empty()))
    }

    pub fn finish(&mut self) -> StreamResult<()> {
        self.reader.finish()
    }
}

/// Escaped quotes come in pairs, so an odd count leaves a cell open
fn has_open_quote(record: &str) -> bool {
    record.bytes().filter(|b| *b == b'"').count() % 2 == 1
}

fn split_record(line: &str) -> StreamResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(str::to_string).collect()),
        None => Ok(Vec::new()),
    }
}
