//! Types shared by every layer that touches the car listings warehouse table:
//! the column schema registry, the tagged value union that records are built
//! from, and the uniform result envelope returned by the gateway.

pub mod envelope;
pub mod schema;
pub mod value;

pub use envelope::{Envelope, Status};
pub use schema::{CAR_DATA_SCHEMA, CAR_DATA_TABLE, ColumnType, ParseColumnTypeError, TableSchema};
pub use value::{FilterValue, MapValue, Record, Value};
