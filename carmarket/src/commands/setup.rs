use carmarket_clap_blocks::warehouse::WarehouseArgs;
use carmarket_client::Gateway;
use carmarket_types::CAR_DATA_SCHEMA;
use clap::Parser;

use super::common::{WarehouseError, report};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Client(#[from] carmarket_client::Error),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    warehouse: WarehouseArgs,

    /// Drop the table before creating it, discarding every row
    #[clap(long = "replace", action)]
    replace: bool,

    #[clap(flatten)]
    pub(crate) logging_config: trogging::cli::LoggingConfig,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    let gateway = Gateway::new(&config.warehouse.warehouse_config())?;
    let table = &config.warehouse.table;

    if config.replace {
        report(gateway.drop_table(table).await)?;
    }
    report(gateway.create_table(table, &CAR_DATA_SCHEMA).await)?;

    Ok(())
}
