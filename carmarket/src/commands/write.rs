use std::path::PathBuf;

use carmarket_clap_blocks::warehouse::WarehouseArgs;
use carmarket_client::Gateway;
use carmarket_server::mapping::{UploadError, UploadFormat, records_from_upload};
use carmarket_types::CAR_DATA_SCHEMA;
use clap::Parser;
use tokio::io;

use super::common::{WarehouseError, report};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Client(#[from] carmarket_client::Error),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("error reading file: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported file {0:?}, expected .xlsx, .xls or .csv")]
    UnsupportedFormat(PathBuf),

    #[error("invalid spreadsheet: {0}")]
    Spreadsheet(#[from] UploadError),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
#[clap(visible_alias = "w")]
pub(crate) struct Config {
    #[clap(flatten)]
    warehouse: WarehouseArgs,

    /// Workbook (.xlsx, .xls) or CSV file whose header row names front end fields
    /// (brand, model, guide_price, ...)
    #[clap(short = 'f', long = "file", action)]
    file_path: PathBuf,

    #[clap(flatten)]
    pub(crate) logging_config: trogging::cli::LoggingConfig,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    let format = config
        .file_path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(UploadFormat::from_file_name)
        .ok_or_else(|| Error::UnsupportedFormat(config.file_path.clone()))?;
    let contents = tokio::fs::read(&config.file_path).await?;
    let records = records_from_upload(format, &contents, &CAR_DATA_SCHEMA)?;

    let gateway = Gateway::new(&config.warehouse.warehouse_config())?;
    report(
        gateway
            .insert(&config.warehouse.table, &records, &CAR_DATA_SCHEMA)
            .await,
    )?;

    Ok(())
}
