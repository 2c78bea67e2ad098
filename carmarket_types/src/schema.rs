//! The schema registry: column names mapped to their declared warehouse types.

use std::{fmt::Display, str::FromStr, sync::LazyLock};

use indexmap::IndexMap;

/// The table every listing is written to unless configured otherwise
pub const CAR_DATA_TABLE: &str = "car_data";

/// Storage column names of the `car_data` table
pub mod columns {
    pub const CAR_BRAND: &str = "car_brand";
    pub const CITY: &str = "city";
    pub const CAR_MODEL: &str = "car_model";
    pub const MANUFACTURER_SUGGESTED_PRICE: &str = "manufacturer_suggested_price";
    pub const ENGINE_HORSEPOWER: &str = "engine_horsepower";
    pub const NUM_DOORS: &str = "num_doors";
    pub const MIN_REFERENCE_PRICE: &str = "min_reference_price";
    pub const CAR_TYPE: &str = "car_type";
    pub const MANUFACTURE_YEAR: &str = "manufacture_year";
    pub const FUEL_CAPACITY: &str = "fuel_capacity";
    pub const POPULARITY: &str = "popularity";
    pub const DISCOUNT_PERCENTAGE: &str = "discount_percentage";
    pub const HISTORICAL_PRICE: &str = "historical_price";
    pub const CITY_LICENSE_PLATES: &str = "city_license_plates";
}

/// The schema of the `car_data` table, in column order
pub static CAR_DATA_SCHEMA: LazyLock<TableSchema> = LazyLock::new(|| {
    use columns::*;

    TableSchema::new()
        .with_column(CAR_BRAND, ColumnType::String)
        .with_column(CITY, ColumnType::String)
        .with_column(CAR_MODEL, ColumnType::String)
        .with_column(MANUFACTURER_SUGGESTED_PRICE, ColumnType::decimal(10, 2))
        .with_column(ENGINE_HORSEPOWER, ColumnType::Int)
        .with_column(NUM_DOORS, ColumnType::Int)
        .with_column(MIN_REFERENCE_PRICE, ColumnType::decimal(10, 2))
        .with_column(CAR_TYPE, ColumnType::String)
        .with_column(MANUFACTURE_YEAR, ColumnType::Int)
        .with_column(FUEL_CAPACITY, ColumnType::decimal(5, 2))
        .with_column(POPULARITY, ColumnType::Int)
        .with_column(DISCOUNT_PERCENTAGE, ColumnType::decimal(5, 2))
        .with_column(HISTORICAL_PRICE, ColumnType::StringIntMap)
        .with_column(CITY_LICENSE_PLATES, ColumnType::StringIntMap)
});

/// A declared column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    String,
    Int,
    Decimal { precision: u8, scale: u8 },
    /// `MAP<STRING, INT>`, the only composite type the warehouse table uses
    StringIntMap,
}

impl ColumnType {
    pub const fn decimal(precision: u8, scale: u8) -> Self {
        Self::Decimal { precision, scale }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::StringIntMap)
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "STRING"),
            Self::Int => write!(f, "INT"),
            Self::Decimal { precision, scale } => write!(f, "DECIMAL({precision}, {scale})"),
            Self::StringIntMap => write!(f, "MAP<STRING, INT>"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseColumnTypeError {
    #[error("{0} is not a supported column type, expected STRING, INT, DECIMAL(p, s) or MAP<STRING, INT>")]
    Unsupported(String),

    #[error("invalid decimal precision/scale in {0}")]
    InvalidDecimal(String),
}

impl FromStr for ColumnType {
    type Err = ParseColumnTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "STRING" => return Ok(Self::String),
            "INT" => return Ok(Self::Int),
            "MAP<STRING,INT>" => return Ok(Self::StringIntMap),
            _ => {}
        }

        let Some(args) = normalized
            .strip_prefix("DECIMAL(")
            .and_then(|rest| rest.strip_suffix(')'))
        else {
            return Err(ParseColumnTypeError::Unsupported(s.to_string()));
        };
        let invalid = || ParseColumnTypeError::InvalidDecimal(s.to_string());
        let (precision, scale) = args.split_once(',').ok_or_else(invalid)?;
        let precision: u8 = precision.parse().map_err(|_| invalid())?;
        let scale: u8 = scale.parse().map_err(|_| invalid())?;
        // hive caps decimals at 38 digits
        if precision == 0 || precision > 38 || scale > precision {
            return Err(invalid());
        }
        Ok(Self::Decimal { precision, scale })
    }
}

/// An ordered mapping of column name to declared type
///
/// Iteration order is declaration order, which is also the positional order of
/// values in generated `INSERT` statements and of columns in `CREATE TABLE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    columns: IndexMap<String, ColumnType>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; redeclaring an existing column replaces its type in place
    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.insert(name.into(), column_type);
        self
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnType)> + '_ {
        self.columns.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, ColumnType)> for TableSchema {
    fn from_iter<T: IntoIterator<Item = (S, ColumnType)>>(iter: T) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        }
    }
}
