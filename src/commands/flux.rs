use super::{clean_fields, resolve_settings};
use crate::cli::FluxArgs;
use crate::exit_codes;
use sinfonia::streaming::source::FluxQuery;
use sinfonia::streaming::{StreamError, NO_FIELDS_MESSAGE};

pub fn execute(args: FluxArgs) -> i32 {
    let settings = match resolve_settings(&args.source, None) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let Some(bucket) = settings.bucket else {
        eprintln!("Error: No bucket given. Use --bucket or set $INFLUX_BUCKET");
        return exit_codes::INPUT_ERROR;
    };

    let query = FluxQuery {
        bucket,
        measurement: settings.measurement,
        fields: clean_fields(&args.fields),
        start: settings.start,
        stop: settings.stop,
    };

    match query.to_flux() {
        Ok(flux) => {
            println!("{}", flux);
            exit_codes::SUCCESS
        }
        Err(StreamError::NoFieldsSelected) => {
            eprintln!("Error: {}", NO_FIELDS_MESSAGE);
            exit_codes::INPUT_ERROR
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::INPUT_ERROR
        }
    }
}
