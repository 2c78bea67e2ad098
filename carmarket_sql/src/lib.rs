//! Statement text for the car listings warehouse table.
//!
//! [`codec`] turns records into warehouse literal syntax and decodes returned
//! rows, [`builder`] assembles `CREATE`, `DROP`, `INSERT` and `SELECT`
//! statements from them.
//!
//! Statements are assembled by string concatenation. String values, map keys
//! and filter values are wrapped in single quotes **without escaping**: a
//! value containing `'`, or a map key containing one of the storage
//! delimiters, produces a corrupt (or injectable) statement. Callers must only
//! pass trusted text.

pub mod builder;
pub mod codec;

pub use builder::{
    BuildError, Filters, Projection, Select, build_create, build_drop, build_insert, build_select,
};
pub use codec::{
    MapLiteralError, decode_map_literal, decode_row, decode_value, encode_map, encode_record,
    encode_value, parse_map_literal,
};

/// Separates fields of a row in the table's text storage format
pub const FIELD_DELIMITER: char = '\t';

/// Separates entries of a collection (map entries) in storage and in map literals
pub const COLLECTION_ITEM_DELIMITER: char = ',';

/// Separates a map key from its value in storage and in map literals
pub const MAP_KEY_DELIMITER: char = ':';

/// The literal written for an absent scalar value
pub const NULL_LITERAL: &str = "NULL";
