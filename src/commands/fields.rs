use super::load_mapper;
use crate::cli::FieldsArgs;
use crate::exit_codes;
use crate::output;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldInfo<'a> {
    field: &'a str,
    min: f64,
    max: f64,
    base_frequency: f64,
}

pub fn execute(args: FieldsArgs) -> i32 {
    let mapper = match load_mapper(args.mapping.as_deref()) {
        Ok(mapper) => mapper,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let fields: Vec<FieldInfo> = mapper
        .ranges()
        .map(|(field, range)| FieldInfo {
            field,
            min: range.min,
            max: range.max,
            base_frequency: range.base_frequency,
        })
        .collect();

    if args.json {
        match output::to_json(&fields, false) {
            Ok(json) => {
                if let Err(e) = output::write_output(&json, None) {
                    eprintln!("Error: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else {
        println!("Field Mapping:\n");
        println!(
            "  {:<14} {:>12} {:>12} {:>12}",
            "Field", "Min", "Max", "Base (Hz)"
        );
        println!("  {}", "-".repeat(53));
        for f in &fields {
            println!(
                "  {:<14} {:>12} {:>12} {:>12.2}",
                f.field, f.min, f.max, f.base_frequency
            );
        }
        println!();
        println!("Values are mapped across one octave above the base frequency.");
        println!("Fields not listed use 0..100 at 220 Hz.");
    }

    exit_codes::SUCCESS
}
