use carmarket_clap_blocks::warehouse::WarehouseArgs;
use carmarket_client::Gateway;
use carmarket_sql::{Projection, Select};
use carmarket_types::{CAR_DATA_SCHEMA, FilterValue, Status};
use clap::Parser;

use super::common::{SeparatedKeyValue, SeparatedList};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Client(#[from] carmarket_client::Error),

    #[error("failed to encode result: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Warehouse(String),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
#[clap(visible_alias = "q")]
pub(crate) struct Config {
    #[clap(flatten)]
    warehouse: WarehouseArgs,

    /// Comma separated columns to read, all columns when omitted
    #[clap(short = 'c', long = "columns", action)]
    columns: Option<SeparatedList<String>>,

    /// Drop duplicate rows; requires --columns
    #[clap(long = "distinct", requires = "columns", action)]
    distinct: bool,

    /// Equality filter `column=value`, repeatable; quote the value as 'value' to force a string
    #[clap(short = 'f', long = "filter", action = clap::ArgAction::Append)]
    filters: Vec<SeparatedKeyValue<String, String>>,
}

impl Config {
    fn select(&self) -> Select {
        let projection = match &self.columns {
            Some(SeparatedList(columns)) => Projection::columns(columns.iter().cloned()),
            None => Projection::All,
        };
        self.filters.iter().fold(
            Select::new()
                .with_projection(projection)
                .with_distinct(self.distinct),
            |select, SeparatedKeyValue((column, value))| {
                select.with_filter(column.as_str(), FilterValue::infer(value))
            },
        )
    }
}

pub(crate) async fn command(config: Config) -> Result<()> {
    let gateway = Gateway::new(&config.warehouse.warehouse_config())?;
    let envelope = gateway
        .select(&config.warehouse.table, &config.select(), &CAR_DATA_SCHEMA)
        .await;

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    match envelope.status {
        Status::Error => Err(Error::Warehouse(envelope.message.unwrap_or_default())),
        Status::Success | Status::Warning => Ok(()),
    }
}
