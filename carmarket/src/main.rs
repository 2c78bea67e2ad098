//! Entrypoint of the carmarket binary

use dotenvy::dotenv;
use trogging::{
    TroggingGuard,
    cli::LoggingConfigBuilderExt,
    tracing_subscriber::{Registry, prelude::*},
};

mod commands {
    pub(crate) mod common;
    pub(crate) mod query;
    pub(crate) mod seed;
    pub(crate) mod serve;
    pub(crate) mod setup;
    pub(crate) mod write;
}

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "carmarket",
    version,
    about = "Car market analytics backend and warehouse tools",
    long_about = r#"Car market analytics backend and warehouse tools

Examples:
    # Create the listings table
    carmarket setup --warehouse-host 127.0.0.1 --warehouse-port 10099

    # Fill it with 1000 random listings
    carmarket seed --count 1000 --seed 42

    # Serve the dashboard API
    carmarket serve --http-bind 0.0.0.0:5000

    # Read the listings of one brand
    carmarket query --columns car_model,city --filter car_brand=丰田
"#
)]
struct Config {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Parser)]
#[allow(clippy::large_enum_variant)]
enum Command {
    /// Run the dashboard HTTP API
    Serve(commands::serve::Config),

    /// Create the listings table
    Setup(commands::setup::Config),

    /// Insert randomly generated listings
    Seed(commands::seed::Config),

    /// Read listings and print the result as JSON
    Query(commands::query::Config),

    /// Insert the listings of a CSV spreadsheet
    Write(commands::write::Config),
}

fn main() -> Result<(), std::io::Error> {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    tokio_runtime.block_on(async move {
        fn handle_init_logs(r: Result<TroggingGuard, trogging::Error>) -> TroggingGuard {
            match r {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("Initializing logs failed: {e}");
                    std::process::exit(ReturnCode::Failure as _);
                }
            }
        }

        match config.command {
            None => println!("command required, -h/--help for help"),
            Some(Command::Serve(config)) => {
                let _tracing_guard =
                    handle_init_logs(init_logs_and_tracing(&config.logging_config));
                if let Err(e) = commands::serve::command(config).await {
                    eprintln!("Serve command failed: {e}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
            Some(Command::Setup(config)) => {
                let _tracing_guard =
                    handle_init_logs(init_logs_and_tracing(&config.logging_config));
                if let Err(e) = commands::setup::command(config).await {
                    eprintln!("Setup command failed: {e}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
            Some(Command::Seed(config)) => {
                let _tracing_guard =
                    handle_init_logs(init_logs_and_tracing(&config.logging_config));
                if let Err(e) = commands::seed::command(config).await {
                    eprintln!("Seed command failed: {e}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
            Some(Command::Query(config)) => {
                if let Err(e) = commands::query::command(config).await {
                    eprintln!("Query command failed: {e}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
            Some(Command::Write(config)) => {
                let _tracing_guard =
                    handle_init_logs(init_logs_and_tracing(&config.logging_config));
                if let Err(e) = commands::write::command(config).await {
                    eprintln!("Write command failed: {e}");
                    std::process::exit(ReturnCode::Failure as _)
                }
            }
        }
    });

    Ok(())
}

/// Source the .env file before initialising the Config struct, so settings in
/// it reach clap's `env` lookups. Variables already set take precedence.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        // a missing .env file is fine, clap defaults apply
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(ReturnCode::Failure as _);
        }
    };
}

fn init_logs_and_tracing(
    config: &trogging::cli::LoggingConfig,
) -> Result<TroggingGuard, trogging::Error> {
    let layers = trogging::Builder::new()
        .with_default_log_filter("info")
        .with_logging_config(config)
        .build()?;

    let subscriber = Registry::default().with(layers);
    trogging::install_global(subscriber)
}
