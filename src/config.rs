use crate::streaming::source::{InfluxConnection, RowSourceConfig};
use std::env;
use std::time::Duration;

const DEFAULT_MEASUREMENT: &str = "environment";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_START: &str = "-1h";
const DEFAULT_PACE_MS: u64 = 100;

/// InfluxDB connection and streaming settings loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    /// Base URL of the InfluxDB 2.x server
    pub url: Option<String>,
    /// API token
    pub token: Option<String>,
    /// Organization name
    pub org: Option<String>,
    /// Bucket to query
    pub bucket: Option<String>,
    /// Measurement to filter on
    pub measurement: String,
    /// Timeout for the response headers
    pub timeout_ms: u64,
    /// Range start (relative duration like "-1h" or RFC 3339)
    pub start: String,
    /// Range stop, defaults to now()
    pub stop: Option<String>,
    /// Delay between streamed rows
    pub pace_ms: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            org: None,
            bucket: None,
            measurement: DEFAULT_MEASUREMENT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            start: DEFAULT_START.to_string(),
            stop: None,
            pace_ms: DEFAULT_PACE_MS,
        }
    }
}

impl SourceSettings {
    /// Load settings from environment variables (and a `.env` file if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            url: non_empty("INFLUX_URL"),
            token: non_empty("INFLUX_TOKEN"),
            org: non_empty("INFLUX_ORG"),
            bucket: non_empty("INFLUX_BUCKET"),
            measurement: non_empty("INFLUX_MEASUREMENT")
                .unwrap_or_else(|| DEFAULT_MEASUREMENT.to_string()),
            timeout_ms: parse_number("INFLUX_TIMEOUT_MS", non_empty("INFLUX_TIMEOUT_MS"))?
                .unwrap_or(DEFAULT_TIMEOUT_MS),
            start: non_empty("SINFONIA_START").unwrap_or_else(|| DEFAULT_START.to_string()),
            stop: non_empty("SINFONIA_STOP"),
            pace_ms: parse_number("SINFONIA_PACE_MS", non_empty("SINFONIA_PACE_MS"))?
                .unwrap_or(DEFAULT_PACE_MS),
        })
    }

    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }

    /// Build the InfluxDB source configuration; url, token, org and bucket are required
    pub fn influx_source(&self) -> Result<RowSourceConfig, ConfigError> {
        let (connection, bucket) = self.influx_connection()?;
        Ok(RowSourceConfig::Influx {
            url: connection.url,
            token: connection.token,
            org: connection.org,
            bucket,
            measurement: self.measurement.clone(),
            start: self.start.clone(),
            stop: self.stop.clone(),
            timeout_ms: Some(self.timeout_ms),
        })
    }

    /// Connection and bucket, as used by schema lookups
    pub fn influx_connection(&self) -> Result<(InfluxConnection, String), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "INFLUX_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        let connection = InfluxConnection {
            url: required(&self.url, "INFLUX_URL")?,
            token: required(&self.token, "INFLUX_TOKEN")?,
            org: required(&self.org, "INFLUX_ORG")?,
            timeout: Duration::from_millis(self.timeout_ms),
        };
        Ok((connection, required(&self.bucket, "INFLUX_BUCKET")?))
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, ConfigError> {
    value
        .clone()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_number(key: &str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber(key.to_string(), v))
        })
        .transpose()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid number for {0}: {1}")]
    InvalidNumber(String, String),
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
