use std::path::PathBuf;

use carmarket_clap_blocks::warehouse::WarehouseArgs;
use carmarket_client::Gateway;
use carmarket_load_generator::{CarDataGenerator, CarDataSpec};
use carmarket_types::CAR_DATA_SCHEMA;
use clap::Parser;
use observability_deps::tracing::info;

use super::common::{WarehouseError, report};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Client(#[from] carmarket_client::Error),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("invalid data spec: {0:#}")]
    Spec(#[source] anyhow::Error),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    warehouse: WarehouseArgs,

    /// Number of listings to insert
    #[clap(short = 'n', long = "count", default_value_t = 100, action)]
    count: usize,

    /// Listings per INSERT statement
    #[clap(long = "batch-size", default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..), action)]
    batch_size: u64,

    /// Seed for the random generator; the same seed yields the same listings
    #[clap(long = "seed", action)]
    seed: Option<u64>,

    /// JSON file overriding the value pools and ranges listings are drawn from
    #[clap(long = "spec", action)]
    spec: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) logging_config: trogging::cli::LoggingConfig,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    let spec = match &config.spec {
        Some(path) => CarDataSpec::from_path(path).map_err(Error::Spec)?,
        None => CarDataSpec::default(),
    };
    let mut generator = CarDataGenerator::new(spec, config.seed).map_err(Error::Spec)?;
    let gateway = Gateway::new(&config.warehouse.warehouse_config())?;
    let table = &config.warehouse.table;

    let records = generator.records(config.count);
    info!(count = records.len(), seed = ?config.seed, %table, "generated listings");
    for batch in records.chunks(config.batch_size as usize) {
        report(gateway.insert(table, batch, &CAR_DATA_SCHEMA).await)?;
    }

    Ok(())
}
