use super::resolve_settings;
use crate::cli::{FieldKeysArgs, InfluxArgs, MeasurementsArgs, TagsArgs};
use crate::exit_codes;
use sinfonia::streaming::source::{InfluxSchema, SchemaQuery};

/// Schema client for the bucket named on the command line or in the environment
fn connect(influx: &InfluxArgs, measurement: Option<&String>) -> Result<(InfluxSchema, String), i32> {
    let settings = resolve_settings(&influx.to_source(measurement), None).map_err(|e| {
        eprintln!("Error: {}", e);
        exit_codes::INPUT_ERROR
    })?;

    let (connection, bucket) = settings.influx_connection().map_err(|e| {
        eprintln!("Error: {}", e);
        exit_codes::INPUT_ERROR
    })?;

    let schema = InfluxSchema::new(connection, bucket).map_err(|e| {
        eprintln!("Error: {}", e);
        exit_codes::INPUT_ERROR
    })?;
    Ok((schema, settings.measurement))
}

async fn list(schema: &InfluxSchema, query: SchemaQuery, json: bool) -> i32 {
    let values = match schema.run(&query).await {
        Ok(values) => values,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::SOURCE_ERROR;
        }
    };

    if json {
        match serde_json::to_string_pretty(&values) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing result: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else {
        for value in &values {
            println!("{}", value);
        }
    }
    exit_codes::SUCCESS
}

pub async fn measurements(args: MeasurementsArgs) -> i32 {
    match connect(&args.influx, None) {
        Ok((schema, _)) => list(&schema, SchemaQuery::Measurements, args.json).await,
        Err(code) => code,
    }
}

pub async fn field_keys(args: FieldKeysArgs) -> i32 {
    match connect(&args.influx, args.measurement.as_ref()) {
        Ok((schema, measurement)) => {
            list(&schema, SchemaQuery::FieldKeys { measurement }, args.json).await
        }
        Err(code) => code,
    }
}

pub async fn tags(args: TagsArgs) -> i32 {
    let (schema, _) = match connect(&args.influx, None) {
        Ok(connected) => connected,
        Err(code) => return code,
    };

    let measurement = args.measurement.clone();
    let query = match args.tag {
        Some(tag) => SchemaQuery::TagValues { tag, measurement },
        None => SchemaQuery::TagKeys { measurement },
    };
    // An empty tag name is rejected before anything is sent
    if let Err(e) = query.to_flux("") {
        eprintln!("Error: {}", e);
        return exit_codes::INPUT_ERROR;
    }
    list(&schema, query, args.json).await
}
