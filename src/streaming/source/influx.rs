// InfluxDB row source
//
// Issues one Flux query per stream and decodes the CSV response while it is
// still arriving, so rows become available as soon as their line is complete.
// The query pivots field values into one row per timestamp and sorts by time,
// which gives the ordering the streamer relies on.

use super::{CsvRowDecoder, RowSource};
use crate::streaming::types::{Row, StreamError, StreamResult};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::time::Duration;

/// Connection settings for the InfluxDB 2.x HTTP API
#[derive(Debug, Clone)]
pub struct InfluxConnection {
    pub url: String,
    pub token: String,
    pub org: String,
    /// Time allowed until the response headers arrive
    pub timeout: Duration,
}

/// Row selection for one stream
#[derive(Debug, Clone)]
pub struct FluxQuery {
    pub bucket: String,
    pub measurement: String,
    pub fields: Vec<String>,
    pub start: String,
    pub stop: Option<String>,
}

pub(super) fn flux_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Range bounds are spliced in as Flux literals (`-1h`, `2024-01-01T00:00:00Z`, `now()`)
fn validate_range_bound(bound: &str) -> StreamResult<&str> {
    let valid = !bound.is_empty()
        && bound
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | ':' | '.' | '(' | ')'));
    if valid {
        Ok(bound)
    } else {
        Err(StreamError::InvalidConfig(format!(
            "invalid range bound '{}'",
            bound
        )))
    }
}

impl FluxQuery {
    /// Render the query text
    pub fn to_flux(&self) -> StreamResult<String> {
        if self.fields.is_empty() {
            return Err(StreamError::NoFieldsSelected);
        }

        let start = validate_range_bound(&self.start)?;
        let stop = validate_range_bound(self.stop.as_deref().unwrap_or("now()"))?;
        let filter = self
            .fields
            .iter()
            .map(|f| format!("r._field == {}", flux_string(f)))
            .collect::<Vec<_>>()
            .join(" or ");

        Ok(format!(
            r#"from(bucket: {bucket})
  |> range(start: {start}, stop: {stop})
  |> filter(fn: (r) => r._measurement == {measurement})
  |> filter(fn: (r) => {filter})
  |> pivot(rowKey: ["_time"], columnKey: ["_field"], valueColumn: "_value")
  |> sort(columns: ["_time"], desc: false)"#,
            bucket = flux_string(&self.bucket),
            measurement = flux_string(&self.measurement),
        ))
    }
}

/// Response body split into lines as chunks arrive
pub(super) struct ResponseLines {
    body: Option<BoxStream<'static, reqwest::Result<Vec<u8>>>>,
    pending: Vec<u8>,
}

impl ResponseLines {
    /// Next complete line, or the unterminated tail once the body ends
    pub(super) async fn next_line(&mut self) -> StreamResult<Option<String>> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            let Some(body) = self.body.as_mut() else {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let tail = std::mem::take(&mut self.pending);
                return Ok(Some(String::from_utf8_lossy(&tail).into_owned()));
            };

            match body.next().await {
                Some(chunk) => self.pending.extend_from_slice(&chunk?),
                None => self.body = None,
            }
        }
    }
}

pub(super) fn http_client(connection: &InfluxConnection) -> StreamResult<reqwest::Client> {
    if connection.url.is_empty() || connection.token.is_empty() || connection.org.is_empty() {
        return Err(StreamError::InvalidConfig(
            "url, token, and org are required parameters".to_string(),
        ));
    }
    Ok(reqwest::Client::builder()
        .connect_timeout(connection.timeout)
        .build()?)
}

/// POST a Flux query and hand back the CSV body
pub(super) async fn send_query(
    client: reqwest::Client,
    connection: InfluxConnection,
    flux: String,
) -> StreamResult<ResponseLines> {
    let endpoint = format!("{}/api/v2/query", connection.url.trim_end_matches('/'));

    log::info!("Querying InfluxDB at {}", endpoint);
    log::debug!("Flux query:\n{}", flux);

    let request = client
        .post(&endpoint)
        .query(&[("org", connection.org.as_str())])
        .header(
            reqwest::header::AUTHORIZATION,
            format!("Token {}", connection.token),
        )
        .header(reqwest::header::ACCEPT, "application/csv")
        .json(&serde_json::json!({
            "query": flux,
            "type": "flux",
            "dialect": { "header": true, "annotations": [] },
        }))
        .send();

    let response = tokio::time::timeout(connection.timeout, request)
        .await
        .map_err(|_| {
            StreamError::Connection(format!(
                "no response from {} within {:?}",
                endpoint, connection.timeout
            ))
        })?
        .map_err(|e| StreamError::Connection(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StreamError::Query(format!("{}: {}", status, body.trim())));
    }

    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
        .boxed();
    Ok(ResponseLines {
        body: Some(body),
        pending: Vec::new(),
    })
}

pub struct InfluxRowSource {
    client: reqwest::Client,
    connection: InfluxConnection,
    query: FluxQuery,
    response: Option<ResponseLines>,
    decoder: CsvRowDecoder,
    exhausted: bool,
}

impl InfluxRowSource {
    pub fn new(connection: InfluxConnection, query: FluxQuery) -> StreamResult<Self> {
        let client = http_client(&connection)?;
        // Fail early on a query that cannot be rendered
        query.to_flux()?;

        Ok(Self {
            client,
            connection,
            query,
            response: None,
            decoder: CsvRowDecoder::new(),
            exhausted: false,
        })
    }
}

#[async_trait]
impl RowSource for InfluxRowSource {
    async fn next_row(&mut self) -> StreamResult<Option<Row>> {
        loop {
            if self.exhausted {
                return Ok(None);
            }

            if self.response.is_none() {
                let flux = self.query.to_flux()?;
                let response =
                    send_query(self.client.clone(), self.connection.clone(), flux).await?;
                self.response = Some(response);
            }
            let Some(response) = self.response.as_mut() else {
                return Ok(None);
            };

            match response.next_line().await? {
                Some(line) => {
                    if let Some(row) = self.decoder.push_line(&line)? {
                        return Ok(Some(row));
                    }
                }
                None => {
                    self.exhausted = true;
                    self.response = None;
                    self.decoder.finish()?;
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!(
            "influx {} bucket={} measurement={} start={}",
            self.connection.url, self.query.bucket, self.query.measurement, self.query.start
        )
    }
}
