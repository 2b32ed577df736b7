// Pluggable row source system for streaming
//
// This module defines the `RowSource` trait, which abstracts "give me the next
// row" over the different places rows can come from. New sources can be added by:
// 1. Implementing the RowSource trait
// 2. Adding a variant to RowSourceConfig
// 3. Registering in the factory function
//
// Current implementations:
// - InfluxDB: Flux query over HTTP, response decoded lazily as CSV
// - File: local CSV or JSON-lines replay
// - Memory: in-process rows, used for embedding and tests
//
// `schema` lists measurements, field keys and tags of an InfluxDB bucket.

mod csv_decoder;
mod file;
mod influx;
mod memory;
mod schema;

use crate::streaming::types::{Row, StreamResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use csv_decoder::{
    parse_timestamp, CsvRecord, CsvRecordReader, CsvRowDecoder, ValueColumnDecoder,
};
pub use file::FileRowSource;
pub use influx::{FluxQuery, InfluxConnection, InfluxRowSource};
pub use memory::MemoryRowSource;
pub use schema::{InfluxSchema, SchemaQuery, NO_FIELD_KEYS_MESSAGE};

/// Configuration for different row source types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RowSourceConfig {
    /// InfluxDB 2.x query API
    #[serde(rename = "influx")]
    Influx {
        url: String,
        token: String,
        org: String,
        bucket: String,
        measurement: String,
        /// Range start, e.g. "-1h" or an RFC 3339 instant
        start: String,
        /// Range stop, defaults to now()
        #[serde(default)]
        stop: Option<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Local file replay (.csv, .jsonl or .ndjson)
    #[serde(rename = "file")]
    File { path: String },
}

/// Trait for all row sources
///
/// A source yields rows lazily and in non-decreasing timestamp order. `Ok(None)`
/// means the sequence is exhausted; an error ends the stream.
#[async_trait]
pub trait RowSource: Send {
    /// Pull the next row
    async fn next_row(&mut self) -> StreamResult<Option<Row>>;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Factory function to create a RowSource from configuration
///
/// `fields` is the caller's selection; query-backed sources only fetch those.
pub fn create_source(
    config: RowSourceConfig,
    fields: &[String],
) -> StreamResult<Box<dyn RowSource>> {
    match config {
        RowSourceConfig::Influx {
            url,
            token,
            org,
            bucket,
            measurement,
            start,
            stop,
            timeout_ms,
        } => {
            let connection = InfluxConnection {
                url,
                token,
                org,
                timeout: Duration::from_millis(timeout_ms.unwrap_or(10_000)),
            };
            let query = FluxQuery {
                bucket,
                measurement,
                fields: fields.to_vec(),
                start,
                stop,
            };
            Ok(Box::new(InfluxRowSource::new(connection, query)?))
        }

        RowSourceConfig::File { path } => Ok(Box::new(FileRowSource::open(path)?)),
    }
}
