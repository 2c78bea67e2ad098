//! Statement text for the warehouse: table DDL, bulk inserts and filtered selects.

use carmarket_types::{FilterValue, Record, TableSchema};
use indexmap::IndexMap;

use crate::{COLLECTION_ITEM_DELIMITER, FIELD_DELIMITER, MAP_KEY_DELIMITER, codec::encode_record};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("no records to insert")]
    NoRecords,

    #[error("DISTINCT requires an explicit column list")]
    DistinctWildcard,

    #[error("column projection is empty")]
    EmptyProjection,

    #[error("filter on column '{0}' has a non-finite value")]
    NonFiniteFilter(String),
}

/// Equality predicates, AND-ed together in insertion order
pub type Filters = IndexMap<String, FilterValue>;

/// The column list of a select
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    #[default]
    All,
    Columns(Vec<String>),
}

impl Projection {
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Columns(columns.into_iter().map(Into::into).collect())
    }
}

/// A single-table select
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub projection: Projection,
    pub distinct: bool,
    pub filters: Filters,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Add an equality filter; a repeated column replaces the earlier value
    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters.extend(filters);
        self
    }
}

/// `CREATE TABLE IF NOT EXISTS` for `schema`, in delimited text row format
///
/// The delimiters match the ones the codec writes map literals with.
pub fn build_create(table: &str, schema: &TableSchema) -> String {
    let columns = schema
        .columns()
        .map(|(name, column_type)| format!("{name} {column_type}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {table} ({columns})\n\
         ROW FORMAT DELIMITED\n\
         FIELDS TERMINATED BY '{field}'\n\
         COLLECTION ITEMS TERMINATED BY '{COLLECTION_ITEM_DELIMITER}'\n\
         MAP KEYS TERMINATED BY '{MAP_KEY_DELIMITER}'",
        field = FIELD_DELIMITER.escape_default(),
    )
}

pub fn build_drop(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {table}")
}

/// One multi-row `INSERT INTO TABLE ... VALUES` for every record, in order
pub fn build_insert(
    table: &str,
    records: &[Record],
    schema: &TableSchema,
) -> Result<String, BuildError> {
    if records.is_empty() {
        return Err(BuildError::NoRecords);
    }
    let values = records
        .iter()
        .map(|record| encode_record(record, schema))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("INSERT INTO TABLE {table} VALUES {values}"))
}

/// `SELECT` over `database.table`
///
/// String filter values are single-quoted, numeric ones are written bare.
/// Column names and values are not escaped. DISTINCT is refused over `*`,
/// whether implied by [`Projection::All`] or listed as a column.
pub fn build_select(database: &str, table: &str, select: &Select) -> Result<String, BuildError> {
    let projection = match &select.projection {
        Projection::All if select.distinct => return Err(BuildError::DistinctWildcard),
        Projection::All => "*".to_string(),
        Projection::Columns(columns) if columns.is_empty() => {
            return Err(BuildError::EmptyProjection);
        }
        Projection::Columns(columns)
            if select.distinct && columns.iter().any(|column| column.trim() == "*") =>
        {
            return Err(BuildError::DistinctWildcard);
        }
        Projection::Columns(columns) => columns.join(", "),
    };
    if let Some((column, _)) = select
        .filters
        .iter()
        .find(|(_, value)| matches!(value, FilterValue::Float(f) if !f.is_finite()))
    {
        return Err(BuildError::NonFiniteFilter(column.clone()));
    }
    let distinct = if select.distinct { "DISTINCT " } else { "" };

    let mut statement = format!("SELECT {distinct}{projection} FROM {database}.{table}");
    if !select.filters.is_empty() {
        let predicates = select
            .filters
            .iter()
            .map(|(column, value)| match value {
                FilterValue::String(s) => format!("{column} = '{s}'"),
                FilterValue::Int(_) | FilterValue::Float(_) => format!("{column} = {value}"),
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        statement.push_str(" WHERE ");
        statement.push_str(&predicates);
    }
    Ok(statement)
}
