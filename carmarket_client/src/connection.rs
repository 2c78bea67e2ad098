use std::fmt::Debug;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::Result;

/// Opens connections to the warehouse
#[async_trait]
pub trait Connector: Debug + Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// A single open warehouse session
///
/// `close` must be called once the session is no longer needed; the
/// [`Gateway`](crate::Gateway) does so on every path.
#[async_trait]
pub trait Connection: Send {
    /// Run one statement to completion and fetch everything it returned
    async fn execute(&mut self, statement: &str) -> Result<ResultSet>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Column names and raw row values returned by a statement
///
/// Statements that return nothing (DDL, inserts) produce an empty set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
}

impl ResultSet {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: vec![],
        }
    }

    pub fn with_row(mut self, row: Vec<JsonValue>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Zip every row with the column names
    ///
    /// Table-qualified names (`car_data.city`) are reduced to the bare column
    /// name. A row shorter than the column list yields only the columns it has.
    pub fn into_named_rows(self) -> impl Iterator<Item = IndexMap<String, JsonValue>> {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| bare_column_name(c).to_string())
            .collect();
        self.rows
            .into_iter()
            .map(move |row| columns.iter().cloned().zip(row).collect())
    }
}

fn bare_column_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(_, column)| column)
}
