use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sinfonia",
    version,
    about = "Streaming sonification of time-series sensor data",
    long_about = "Streaming sonification of time-series sensor data.\n\n\
                  Stream sensor measurements from InfluxDB (or a recorded file) and turn them into sound.\n\
                  Connection settings fall back to $INFLUX_URL, $INFLUX_TOKEN, $INFLUX_ORG and $INFLUX_BUCKET."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Stream rows and play each one as a chord
    Live(StreamArgs),
    /// Stream rows into a timeline and play it when the stream completes
    Timeline(StreamArgs),
    /// Print the Flux query for a field selection
    Flux(FluxArgs),
    /// List the field mapping table
    Fields(FieldsArgs),
    /// List the measurements of a bucket
    Measurements(MeasurementsArgs),
    /// List the field keys of a measurement
    FieldKeys(FieldKeysArgs),
    /// List tag keys, or the values of one tag
    Tags(TagsArgs),
}

/// InfluxDB connection options; unset ones fall back to the environment
#[derive(Args, Clone, Default)]
pub struct InfluxArgs {
    /// InfluxDB base URL [env: INFLUX_URL]
    #[arg(long)]
    pub url: Option<String>,

    /// InfluxDB API token [env: INFLUX_TOKEN]
    #[arg(long)]
    pub token: Option<String>,

    /// InfluxDB organization [env: INFLUX_ORG]
    #[arg(long)]
    pub org: Option<String>,

    /// Bucket to inspect [env: INFLUX_BUCKET]
    #[arg(long)]
    pub bucket: Option<String>,
}

impl InfluxArgs {
    pub fn to_source(&self, measurement: Option<&String>) -> SourceArgs {
        SourceArgs {
            url: self.url.clone(),
            token: self.token.clone(),
            org: self.org.clone(),
            bucket: self.bucket.clone(),
            measurement: measurement.cloned(),
            ..Default::default()
        }
    }
}

#[derive(Args)]
pub struct MeasurementsArgs {
    #[command(flatten)]
    pub influx: InfluxArgs,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct FieldKeysArgs {
    #[command(flatten)]
    pub influx: InfluxArgs,

    /// Measurement to inspect [env: INFLUX_MEASUREMENT, default: environment]
    #[arg(long)]
    pub measurement: Option<String>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct TagsArgs {
    #[command(flatten)]
    pub influx: InfluxArgs,

    /// Only consider series of this measurement
    #[arg(long)]
    pub measurement: Option<String>,

    /// List the values of this tag instead of the tag keys
    #[arg(long)]
    pub tag: Option<String>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Where rows come from. Unset InfluxDB options fall back to the environment.
#[derive(Args, Clone, Default)]
pub struct SourceArgs {
    /// Replay a local .csv, .jsonl or .ndjson file instead of querying InfluxDB
    #[arg(long, conflicts_with_all = ["url", "token", "org", "bucket"])]
    pub file: Option<String>,

    /// InfluxDB base URL [env: INFLUX_URL]
    #[arg(long)]
    pub url: Option<String>,

    /// InfluxDB API token [env: INFLUX_TOKEN]
    #[arg(long)]
    pub token: Option<String>,

    /// InfluxDB organization [env: INFLUX_ORG]
    #[arg(long)]
    pub org: Option<String>,

    /// Bucket to query [env: INFLUX_BUCKET]
    #[arg(long)]
    pub bucket: Option<String>,

    /// Measurement to query [env: INFLUX_MEASUREMENT, default: environment]
    #[arg(long)]
    pub measurement: Option<String>,

    /// Range start, e.g. -1h or 2024-01-01T00:00:00Z [env: SINFONIA_START]
    #[arg(long, allow_hyphen_values = true)]
    pub start: Option<String>,

    /// Range stop [env: SINFONIA_STOP, default: now()]
    #[arg(long, allow_hyphen_values = true)]
    pub stop: Option<String>,
}

#[derive(Args)]
pub struct StreamArgs {
    /// Fields to sonify, in order (e.g. temperatura,humedad,presion).
    /// Without it every field key of the InfluxDB measurement is used.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub fields: Vec<String>,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Delay between rows in milliseconds [env: SINFONIA_PACE_MS, default: 100]
    #[arg(long)]
    pub pace_ms: Option<u64>,

    /// JSON file replacing the built-in field mapping table
    #[arg(long)]
    pub mapping: Option<String>,

    /// Record sounds instead of logging them; timeline playback is not waited for
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Output file for the JSON summary (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct FluxArgs {
    /// Fields to query
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub fields: Vec<String>,

    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Args)]
pub struct FieldsArgs {
    /// JSON file replacing the built-in field mapping table
    #[arg(long)]
    pub mapping: Option<String>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
