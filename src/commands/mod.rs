pub mod fields;
pub mod flux;
pub mod live;
pub mod schema;
pub mod timeline;

use crate::cli::{SourceArgs, StreamArgs};
use crate::exit_codes;
use crate::output::{self, RunReport};
use sinfonia::playback::{AudioOutput, LogOutput, RecordingOutput};
use sinfonia::streaming::source::{InfluxSchema, NO_FIELD_KEYS_MESSAGE};
use sinfonia::streaming::{
    create_source, OrchestratorConfig, RowSource, RowSourceConfig, StreamingOrchestrator,
    NO_FIELDS_MESSAGE,
};
use sinfonia::{FieldMapper, SourceSettings};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything a streaming command needs
pub struct Session {
    pub orchestrator: Arc<StreamingOrchestrator>,
    pub source: Box<dyn RowSource>,
    pub fields: Vec<String>,
    /// Set with --dry-run
    pub recording: Option<Arc<RecordingOutput>>,
}

/// Selected field names with blanks removed
pub fn clean_fields(fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

/// Environment settings with command-line overrides applied
pub fn resolve_settings(source: &SourceArgs, pace_ms: Option<u64>) -> Result<SourceSettings, String> {
    let mut settings = SourceSettings::from_env().map_err(|e| e.to_string())?;

    let overrides = [
        (&mut settings.url, &source.url),
        (&mut settings.token, &source.token),
        (&mut settings.org, &source.org),
        (&mut settings.bucket, &source.bucket),
        (&mut settings.stop, &source.stop),
    ];
    for (setting, value) in overrides {
        if value.is_some() {
            *setting = value.clone();
        }
    }
    if let Some(measurement) = &source.measurement {
        settings.measurement = measurement.clone();
    }
    if let Some(start) = &source.start {
        settings.start = start.clone();
    }
    if let Some(pace_ms) = pace_ms {
        settings.pace_ms = pace_ms;
    }

    Ok(settings)
}

pub fn source_config(source: &SourceArgs, settings: &SourceSettings) -> Result<RowSourceConfig, String> {
    match &source.file {
        Some(path) => Ok(RowSourceConfig::File { path: path.clone() }),
        None => settings.influx_source().map_err(|e| e.to_string()),
    }
}

pub fn load_mapper(path: Option<&str>) -> Result<FieldMapper, String> {
    match path {
        Some(path) => FieldMapper::from_json_file(Path::new(path))
            .map_err(|e| format!("Failed to load mapping '{}': {}", path, e)),
        None => Ok(FieldMapper::default()),
    }
}

/// Every field key of the configured measurement
async fn all_field_keys(settings: &SourceSettings) -> Result<Vec<String>, i32> {
    let (connection, bucket) = settings.influx_connection().map_err(|e| {
        eprintln!("Error: {}", e);
        exit_codes::INPUT_ERROR
    })?;

    let keys = match InfluxSchema::new(connection, bucket) {
        Ok(schema) => schema.field_keys(&settings.measurement).await,
        Err(e) => Err(e),
    };
    let keys = clean_fields(&keys.map_err(|e| {
        eprintln!("Error: {}", e);
        exit_codes::SOURCE_ERROR
    })?);

    if keys.is_empty() {
        eprintln!("Error: {}", NO_FIELD_KEYS_MESSAGE);
        return Err(exit_codes::SOURCE_ERROR);
    }
    log::info!(
        "No fields given, selecting all {} field keys of {}",
        keys.len(),
        settings.measurement
    );
    Ok(keys)
}

/// Validate arguments and build the orchestrator and source.
/// Without --fields an InfluxDB source selects every field key.
/// Errors are printed; the exit code is returned.
pub async fn prepare(args: &StreamArgs) -> Result<Session, i32> {
    let settings = resolve_settings(&args.source, args.pace_ms).map_err(|e| {
        eprintln!("Error: {}", e);
        exit_codes::INPUT_ERROR
    })?;

    let mut fields = clean_fields(&args.fields);
    if fields.is_empty() {
        if args.source.file.is_some() {
            eprintln!("Error: {}", NO_FIELDS_MESSAGE);
            return Err(exit_codes::INPUT_ERROR);
        }
        fields = all_field_keys(&settings).await?;
    }

    let mapper = load_mapper(args.mapping.as_deref()).map_err(|e| {
        eprintln!("Error: {}", e);
        exit_codes::INPUT_ERROR
    })?;

    let config = source_config(&args.source, &settings).map_err(|e| {
        eprintln!("Error: {}", e);
        exit_codes::INPUT_ERROR
    })?;

    let source = create_source(config, &fields).map_err(|e| {
        eprintln!("Error: {}", e);
        exit_codes::SOURCE_ERROR
    })?;

    let recording = args.dry_run.then(|| Arc::new(RecordingOutput::new()));
    let audio: Arc<dyn AudioOutput> = match &recording {
        Some(recording) => Arc::clone(recording) as Arc<dyn AudioOutput>,
        None => Arc::new(LogOutput),
    };

    let orchestrator = StreamingOrchestrator::new(
        OrchestratorConfig {
            pace: settings.pace(),
            ..Default::default()
        },
        mapper,
        audio,
    );

    Ok(Session {
        orchestrator: Arc::new(orchestrator),
        source,
        fields,
        recording,
    })
}

/// Route Ctrl-C to the orchestrator's stop
pub fn stop_on_ctrl_c(orchestrator: &Arc<StreamingOrchestrator>) -> JoinHandle<()> {
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            let action = orchestrator.stop();
            log::debug!("Ctrl-C: {:?}", action);
        }
    })
}

/// Print the JSON report and pass the exit code through
pub fn finish(report: &RunReport, args: &StreamArgs, code: i32) -> i32 {
    let json = match output::to_json(report, args.compact) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error serializing result: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };
    if let Err(e) = output::write_output(&json, args.output.as_deref()) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }
    if !args.quiet {
        if let Some(ref path) = args.output {
            eprintln!("Summary written to {}", path);
        }
    }
    code
}
