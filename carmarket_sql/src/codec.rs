//! Encoding of records into warehouse literals and decoding of returned rows.

use carmarket_types::{ColumnType, MapValue, Record, TableSchema, Value};
use indexmap::IndexMap;
use observability_deps::tracing::warn;
use serde_json::Value as JsonValue;

use crate::{COLLECTION_ITEM_DELIMITER, MAP_KEY_DELIMITER, NULL_LITERAL};

/// Encode `record` as a parenthesised `VALUES` tuple against `schema`
///
/// Values are emitted in schema column order, whatever the key order of the
/// record. Fields the schema does not declare are dropped. An explicit null
/// encodes as `NULL` whatever the column type. An absent scalar column encodes
/// as `NULL`; an absent map column encodes as the empty map literal `'{}'`.
pub fn encode_record(record: &Record, schema: &TableSchema) -> String {
    let values = schema
        .columns()
        .map(|(name, column_type)| encode_column(record.get(name), column_type))
        .collect::<Vec<_>>();
    format!("({})", values.join(", "))
}

fn encode_column(value: Option<&Value>, column_type: ColumnType) -> String {
    match value {
        None if column_type.is_map() => encode_map(&MapValue::new()),
        None => NULL_LITERAL.to_string(),
        Some(value) => encode_value(value),
    }
}

/// Encode a single value as a literal
///
/// Strings are wrapped in single quotes as-is, numbers use their default text
/// form, maps use [`encode_map`]. Non-finite decimals have no literal form and
/// encode as `NULL`.
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::Null => NULL_LITERAL.to_string(),
        Value::String(s) => format!("'{s}'"),
        Value::Int(i) => i.to_string(),
        Value::Decimal(f) if f.is_finite() => f.to_string(),
        Value::Decimal(_) => NULL_LITERAL.to_string(),
        Value::Map(map) => encode_map(map),
    }
}

/// Encode a map as `'{'k1':v1,'k2':v2}'`, entries in insertion order
pub fn encode_map(map: &MapValue) -> String {
    let entries = map
        .iter()
        .map(|(key, value)| format!("'{key}'{MAP_KEY_DELIMITER}{value}"))
        .collect::<Vec<_>>()
        .join(&COLLECTION_ITEM_DELIMITER.to_string());
    format!("'{{{entries}}}'")
}

/// Decode one returned row (column name to raw warehouse value)
///
/// String values of map columns are parsed with [`decode_map_literal`];
/// everything else is carried over according to its raw shape.
pub fn decode_row(row: IndexMap<String, JsonValue>, schema: &TableSchema) -> Record {
    row.into_iter()
        .map(|(column, raw)| {
            let value = decode_value(raw, schema.column_type(&column));
            (column, value)
        })
        .collect()
}

pub fn decode_value(raw: JsonValue, column_type: Option<ColumnType>) -> Value {
    match raw {
        JsonValue::String(literal) if column_type.is_some_and(|ty| ty.is_map()) => {
            Value::Map(decode_map_literal(&literal))
        }
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::String(b.to_string()),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map_or(Value::Null, Value::Decimal),
        },
        JsonValue::String(s) => Value::String(s),
        JsonValue::Object(object) => match map_from_json_object(&object) {
            Some(map) => Value::Map(map),
            None => Value::String(JsonValue::Object(object).to_string()),
        },
        array @ JsonValue::Array(_) => Value::String(array.to_string()),
    }
}

/// Parse a map literal, degrading to an empty map when it does not parse
pub fn decode_map_literal(literal: &str) -> MapValue {
    match parse_map_literal(literal) {
        Ok(map) => map,
        Err(error) => {
            warn!(%error, literal, "undecodable map literal, using an empty map");
            MapValue::new()
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MapLiteralError {
    #[error("unbalanced braces in map literal")]
    UnbalancedBraces,

    #[error("map entry {0:?} has no key delimiter")]
    MissingKeyDelimiter(String),

    #[error("map entry {0:?} has an empty key")]
    EmptyKey(String),

    #[error("value {value:?} of map key {key:?} is not an integer")]
    InvalidValue { key: String, value: String },
}

/// Parse a map literal as written by [`encode_map`] or echoed by the warehouse
///
/// A JSON object (the warehouse echoes maps with double-quoted keys) is parsed
/// as JSON, escapes included. Anything else is read as delimited `k:v,k:v`
/// text, braced or bare, with keys taken verbatim after dropping one pair of
/// surrounding quotes. An optional pair of quotes around the whole literal is
/// ignored, and integral decimal values are accepted.
pub fn parse_map_literal(literal: &str) -> Result<MapValue, MapLiteralError> {
    let literal = literal.trim();
    let body = ['\'', '"']
        .into_iter()
        .find_map(|quote| {
            literal
                .strip_prefix(quote)?
                .strip_suffix(quote)
                .filter(|inner| inner.starts_with('{') && inner.ends_with('}'))
        })
        .unwrap_or(literal);

    if let Ok(object) = serde_json::from_str::<serde_json::Map<String, JsonValue>>(body) {
        return map_from_json_object_checked(&object);
    }
    parse_delimited(body)
}

fn parse_delimited(body: &str) -> Result<MapValue, MapLiteralError> {
    let body = match (body.strip_prefix('{'), body.ends_with('}')) {
        (Some(rest), true) => &rest[..rest.len() - 1],
        (None, false) if !body.contains(['{', '}']) => body,
        _ => return Err(MapLiteralError::UnbalancedBraces),
    };

    let mut map = MapValue::new();
    if body.trim().is_empty() {
        return Ok(map);
    }
    for entry in body.split(COLLECTION_ITEM_DELIMITER) {
        // values are integers, so the last delimiter ends the key
        let (key, value) = entry
            .rsplit_once(MAP_KEY_DELIMITER)
            .ok_or_else(|| MapLiteralError::MissingKeyDelimiter(entry.to_string()))?;
        let key = unquote(key.trim());
        if key.is_empty() {
            return Err(MapLiteralError::EmptyKey(entry.to_string()));
        }
        let value = unquote(value.trim());
        let value = parse_integer(value).ok_or_else(|| MapLiteralError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        map.insert(key.to_string(), value);
    }
    Ok(map)
}

fn unquote(s: &str) -> &str {
    ['\'', '"']
        .into_iter()
        .find_map(|quote| s.strip_prefix(quote)?.strip_suffix(quote))
        .unwrap_or(s)
}

fn parse_integer(s: &str) -> Option<i64> {
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn json_integer(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        JsonValue::String(s) => parse_integer(s.trim()),
        _ => None,
    }
}

fn map_from_json_object(object: &serde_json::Map<String, JsonValue>) -> Option<MapValue> {
    map_from_json_object_checked(object).ok()
}

fn map_from_json_object_checked(
    object: &serde_json::Map<String, JsonValue>,
) -> Result<MapValue, MapLiteralError> {
    object
        .iter()
        .map(|(key, value)| {
            json_integer(value)
                .map(|v| (key.clone(), v))
                .ok_or_else(|| MapLiteralError::InvalidValue {
                    key: key.clone(),
                    value: value.to_string(),
                })
        })
        .collect()
}
