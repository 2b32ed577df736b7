// Schema discovery for an InfluxDB bucket
//
// Wraps the Flux `schema` package: measurements, field keys and tags. Every
// call is a single query whose `_value` column lists the keys.

use super::csv_decoder::ValueColumnDecoder;
use super::influx::{flux_string, http_client, send_query};
use super::InfluxConnection;
use crate::streaming::types::{StreamError, StreamResult};

/// Shown when a measurement has no field keys to select from
pub const NO_FIELD_KEYS_MESSAGE: &str =
    "No fields found in the database. Please check your InfluxDB connection and data.";

/// One schema lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaQuery {
    Measurements,
    FieldKeys { measurement: String },
    TagKeys { measurement: Option<String> },
    TagValues { tag: String, measurement: Option<String> },
}

impl SchemaQuery {
    pub fn to_flux(&self, bucket: &str) -> StreamResult<String> {
        let bucket = flux_string(bucket);
        let call = match self {
            SchemaQuery::Measurements => format!("schema.measurements(bucket: {})", bucket),
            SchemaQuery::FieldKeys { measurement } => format!(
                "schema.measurementFieldKeys(bucket: {}, measurement: {})",
                bucket,
                flux_string(measurement)
            ),
            SchemaQuery::TagKeys { measurement } => format!(
                "schema.tagKeys(bucket: {}{})",
                bucket,
                predicate(measurement.as_deref())
            ),
            SchemaQuery::TagValues { tag, measurement } => {
                if tag.trim().is_empty() {
                    return Err(StreamError::InvalidConfig("tag key is required".to_string()));
                }
                format!(
                    "schema.tagValues(bucket: {}, tag: {}{})",
                    bucket,
                    flux_string(tag),
                    predicate(measurement.as_deref())
                )
            }
        };
        Ok(format!("import \"influxdata/influxdb/schema\"\n{}", call))
    }
}

fn predicate(measurement: Option<&str>) -> String {
    match measurement {
        Some(m) => format!(
            ", predicate: (r) => r._measurement == {}",
            flux_string(m)
        ),
        None => String::new(),
    }
}

/// Schema lookups against one bucket
pub struct InfluxSchema {
    client: reqwest::Client,
    connection: InfluxConnection,
    bucket: String,
}

impl InfluxSchema {
    pub fn new(connection: InfluxConnection, bucket: impl Into<String>) -> StreamResult<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() {
            return Err(StreamError::InvalidConfig("bucket is required".to_string()));
        }
        Ok(Self {
            client: http_client(&connection)?,
            connection,
            bucket,
        })
    }

    pub async fn measurements(&self) -> StreamResult<Vec<String>> {
        self.run(&SchemaQuery::Measurements).await
    }

    /// Field keys of one measurement
    pub async fn field_keys(&self, measurement: &str) -> StreamResult<Vec<String>> {
        self.run(&SchemaQuery::FieldKeys {
            measurement: measurement.to_string(),
        })
        .await
    }

    pub async fn tag_keys(&self, measurement: Option<&str>) -> StreamResult<Vec<String>> {
        self.run(&SchemaQuery::TagKeys {
            measurement: measurement.map(str::to_string),
        })
        .await
    }

    pub async fn tag_values(
        &self,
        tag: &str,
        measurement: Option<&str>,
    ) -> StreamResult<Vec<String>> {
        self.run(&SchemaQuery::TagValues {
            tag: tag.to_string(),
            measurement: measurement.map(str::to_string),
        })
        .await
    }

    /// Run a lookup; values keep their first-seen order without repeats
    pub async fn run(&self, query: &SchemaQuery) -> StreamResult<Vec<String>> {
        let flux = query.to_flux(&self.bucket)?;
        let mut response =
            send_query(self.client.clone(), self.connection.clone(), flux).await?;

        let mut decoder = ValueColumnDecoder::new();
        let mut values: Vec<String> = Vec::new();
        while let Some(line) = response.next_line().await? {
            if let Some(value) = decoder.push_line(&line)? {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
        decoder.finish()?;

        log::debug!("{:?} in {}: {} values", query, self.bucket, values.len());
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_measurements_flux() {
        let flux = SchemaQuery::Measurements.to_flux("sensors").unwrap();
        assert_eq!(
            flux,
            "import \"influxdata/influxdb/schema\"\nschema.measurements(bucket: \"sensors\")"
        );
    }

    #[test]
    fn test_field_keys_flux() {
        let flux = SchemaQuery::FieldKeys {
            measurement: "environment".to_string(),
        }
        .to_flux("sensors")
        .unwrap();
        assert!(flux.ends_with(
            "schema.measurementFieldKeys(bucket: \"sensors\", measurement: \"environment\")"
        ));
    }

    #[test]
    fn test_tag_flux_with_predicate() {
        let keys = SchemaQuery::TagKeys { measurement: None }
            .to_flux("sensors")
            .unwrap();
        assert!(keys.ends_with("schema.tagKeys(bucket: \"sensors\")"));

        let values = SchemaQuery::TagValues {
            tag: "device".to_string(),
            measurement: Some("environment".to_string()),
        }
        .to_flux("sensors")
        .unwrap();
        assert!(values.contains("tag: \"device\""));
        assert!(values.contains("predicate: (r) => r._measurement == \"environment\""));
    }

    #[test]
    fn test_tag_values_require_tag() {
        let query = SchemaQuery::TagValues {
            tag: " ".to_string(),
            measurement: None,
        };
        assert!(matches!(
            query.to_flux("sensors"),
            Err(StreamError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_schema_requires_bucket() {
        let connection = InfluxConnection {
            url: "http://localhost:8086".to_string(),
            token: "t".to_string(),
            org: "lab".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(matches!(
            InfluxSchema::new(connection, ""),
            Err(StreamError::InvalidConfig(_))
        ));
    }
}
