use clap::Parser;

mod cli;
mod commands;
mod exit_codes;
mod output;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let exit_code = match cli.command {
        cli::Command::Live(args) => commands::live::execute(args).await,
        cli::Command::Timeline(args) => commands::timeline::execute(args).await,
        cli::Command::Flux(args) => commands::flux::execute(args),
        cli::Command::Fields(args) => commands::fields::execute(args),
        cli::Command::Measurements(args) => commands::schema::measurements(args).await,
        cli::Command::FieldKeys(args) => commands::schema::field_keys(args).await,
        cli::Command::Tags(args) => commands::schema::tags(args).await,
    };

    std::process::exit(exit_code);
}
