use std::{panic::AssertUnwindSafe, sync::Arc};

use carmarket_sql::{BuildError, Select, build_create, build_drop, build_insert, build_select, decode_row};
use carmarket_types::{Envelope, Record, TableSchema};
use futures::FutureExt;
use observability_deps::tracing::{error, info, warn};

use crate::{
    Error, KyuubiConnector, Result, WarehouseConfig,
    connection::{Connector, ResultSet},
};

/// Longest prefix of an INSERT statement written to the log
const STATEMENT_LOG_LIMIT: usize = 500;

/// Runs statements against the warehouse, one connection per call
///
/// Every operation returns an [`Envelope`]; no error or panic from the
/// connection layer escapes, and the connection is closed on every path.
#[derive(Debug, Clone)]
pub struct Gateway {
    database: String,
    connector: Arc<dyn Connector>,
}

impl Gateway {
    /// A gateway talking to the warehouse described by `config`
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        let connector = KyuubiConnector::new(config)?;
        Ok(Self::with_connector(
            config.database.clone(),
            Arc::new(connector),
        ))
    }

    pub fn with_connector(database: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            database: database.into(),
            connector,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub async fn create_table(&self, table: &str, schema: &TableSchema) -> Envelope {
        let statement = build_create(table, schema);
        info!(%table, %statement, "creating table");
        match self.execute(&statement).await {
            Ok(_) => Envelope::success(format!("table '{table}' created or already exists")),
            Err(error) => {
                error!(%error, %table, "failed to create table");
                Envelope::error(format!("failed to create table '{table}': {error}"))
            }
        }
    }

    pub async fn drop_table(&self, table: &str) -> Envelope {
        let statement = build_drop(table);
        info!(%table, %statement, "dropping table");
        match self.execute(&statement).await {
            Ok(_) => Envelope::success(format!("table '{table}' dropped if it existed")),
            Err(error) => {
                error!(%error, %table, "failed to drop table");
                Envelope::error(format!("failed to drop table '{table}': {error}"))
            }
        }
    }

    /// Insert all `records` into `table` with a single statement
    ///
    /// An empty `records` slice is a warning and never touches the warehouse.
    pub async fn insert(&self, table: &str, records: &[Record], schema: &TableSchema) -> Envelope {
        let target = format!("{}.{table}", self.database);
        let statement = match build_insert(&target, records, schema) {
            Ok(statement) => statement,
            Err(BuildError::NoRecords) => {
                warn!(%table, "no records given, skipping insert");
                return Envelope::warning(format!(
                    "no records given, nothing inserted into table '{table}'"
                ));
            }
            Err(error) => return Envelope::error(format!("failed to insert into table '{table}': {error}")),
        };

        info!(
            %table,
            rows = records.len(),
            statement = %log_prefix(&statement, STATEMENT_LOG_LIMIT),
            "inserting records"
        );
        match self.execute(&statement).await {
            Ok(_) => Envelope::success(format!(
                "inserted {} rows into table '{table}'",
                records.len()
            )),
            Err(error) => {
                error!(%error, %table, rows = records.len(), "failed to insert records");
                Envelope::error(format!("failed to insert into table '{table}': {error}"))
            }
        }
    }

    /// Read rows of `table`, decoding them against `schema`
    pub async fn select(&self, table: &str, select: &Select, schema: &TableSchema) -> Envelope {
        let statement = match build_select(&self.database, table, select) {
            Ok(statement) => statement,
            Err(error) => {
                error!(%error, %table, "invalid select");
                return Envelope::error(format!("failed to read table '{table}': {error}"));
            }
        };

        info!(%table, %statement, "reading records");
        match self.execute(&statement).await {
            Ok(result) => {
                let rows: Vec<Record> = result
                    .into_named_rows()
                    .map(|row| decode_row(row, schema))
                    .collect();
                let message = format!("read {} rows from table '{table}'", rows.len());
                Envelope::rows(rows, message)
            }
            Err(error) => {
                error!(%error, %table, "failed to read records");
                Envelope::error(format!("failed to read table '{table}': {error}"))
            }
        }
    }

    async fn execute(&self, statement: &str) -> Result<ResultSet> {
        let mut connection = AssertUnwindSafe(self.connector.connect())
            .catch_unwind()
            .await
            .map_err(Error::panicked)??;

        let outcome = AssertUnwindSafe(connection.execute(statement))
            .catch_unwind()
            .await;
        if let Err(error) = connection.close().await {
            warn!(%error, "failed to close warehouse connection");
        }
        outcome.map_err(Error::panicked)?
    }
}

/// At most `limit` characters of `s`
fn log_prefix(s: &str, limit: usize) -> &str {
    s.char_indices().nth(limit).map_or(s, |(end, _)| &s[..end])
}
