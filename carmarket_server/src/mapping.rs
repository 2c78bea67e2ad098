//! Translation between the storage column names of the listings table and the
//! field names the web front end uses, plus parsing of uploaded spreadsheets.

use std::{io::Cursor, path::Path};

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use carmarket_sql::decode_map_literal;
use carmarket_types::{ColumnType, Record, TableSchema, Value, schema::columns};
use indexmap::IndexMap;
use observability_deps::tracing::warn;

/// Storage column to presentation field
pub const FIELD_MAPPING: [(&str, &str); 10] = [
    (columns::CAR_BRAND, "brand"),
    (columns::CAR_MODEL, "model"),
    (columns::MANUFACTURER_SUGGESTED_PRICE, "guide_price"),
    (columns::ENGINE_HORSEPOWER, "horsepower"),
    (columns::NUM_DOORS, "doors"),
    (columns::MIN_REFERENCE_PRICE, "min_price"),
    (columns::POPULARITY, "attention"),
    (columns::DISCOUNT_PERCENTAGE, "discount"),
    (columns::CAR_TYPE, "car_type"),
    (columns::MANUFACTURE_YEAR, "manufacture_year"),
];

/// Columns an upload names by their storage name
pub const PASS_THROUGH_FIELDS: [&str; 5] = [
    columns::CITY,
    columns::MANUFACTURE_YEAR,
    columns::FUEL_CAPACITY,
    columns::HISTORICAL_PRICE,
    columns::CITY_LICENSE_PLATES,
];

pub fn presentation_name(column: &str) -> Option<&'static str> {
    FIELD_MAPPING
        .iter()
        .find(|(storage, _)| *storage == column)
        .map(|(_, presentation)| *presentation)
}

pub fn storage_name(field: &str) -> Option<&'static str> {
    FIELD_MAPPING
        .iter()
        .find(|(_, presentation)| *presentation == field)
        .map(|(storage, _)| *storage)
}

/// Build a storage record from one uploaded row keyed by column header
///
/// Mapped fields are looked up by presentation name, the pass-through fields
/// by storage name; any other header is ignored. Cells are coerced to the
/// column's declared type.
pub fn record_from_upload(row: &IndexMap<String, String>, schema: &TableSchema) -> Record {
    let mapped = FIELD_MAPPING
        .iter()
        .filter_map(|(storage, presentation)| Some((*storage, row.get(*presentation)?)));
    let pass_through = PASS_THROUGH_FIELDS
        .iter()
        .filter_map(|field| Some((*field, row.get(*field)?)));

    let mut record = Record::new();
    for (column, cell) in mapped.chain(pass_through) {
        let Some(column_type) = schema.column_type(column) else {
            continue;
        };
        record.insert(column.to_string(), coerce_cell(column, cell, column_type));
    }
    record
}

/// Convert spreadsheet cell text to a value of `column_type`
///
/// Blank cells are null. Map cells accept JSON objects (single or double
/// quoted) and fall back to an empty map. Numeric cells that do not parse are
/// null.
pub fn coerce_cell(column: &str, cell: &str, column_type: ColumnType) -> Value {
    let cell = cell.trim();
    if cell.is_empty() {
        return Value::Null;
    }
    match column_type {
        ColumnType::String => Value::from(cell),
        ColumnType::StringIntMap => Value::from(decode_map_literal(cell)),
        ColumnType::Int => {
            let value = Value::from(cell);
            match value.as_i64().or_else(|| whole_number(value.as_f64()?)) {
                Some(i) => Value::from(i),
                None => {
                    warn!(column, cell, "cell is not an integer, storing NULL");
                    Value::Null
                }
            }
        }
        ColumnType::Decimal { .. } => match cell.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::from(f),
            _ => {
                warn!(column, cell, "cell is not a decimal, storing NULL");
                Value::Null
            }
        },
    }
}

/// Spreadsheet exports write integer columns as `4.0`
fn whole_number(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

/// Spreadsheet formats accepted for upload, told apart by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    /// `.xlsx` or `.xls`; the first worksheet is read
    Workbook,
    Csv,
}

impl UploadFormat {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xls" => Some(Self::Workbook),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Workbook(#[from] calamine::Error),
}

/// Parse an uploaded spreadsheet of `format` into storage records
pub fn records_from_upload(
    format: UploadFormat,
    data: &[u8],
    schema: &TableSchema,
) -> Result<Vec<Record>, UploadError> {
    match format {
        UploadFormat::Workbook => Ok(records_from_workbook(data, schema)?),
        UploadFormat::Csv => Ok(records_from_csv(data, schema)?),
    }
}

/// Parse the first worksheet of a workbook, headers in its first row
///
/// Rows with no filled cell are skipped. A workbook without worksheets has no
/// records.
pub fn records_from_workbook(
    data: &[u8],
    schema: &TableSchema,
) -> Result<Vec<Record>, calamine::Error> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))?;
    let Some(sheet) = workbook.worksheet_range_at(0) else {
        return Ok(vec![]);
    };
    let sheet = sheet?;

    let mut rows = sheet.rows();
    let Some(headers) = rows.next() else {
        return Ok(vec![]);
    };
    let headers: Vec<String> = headers
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    Ok(rows
        .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|row| {
            let row: IndexMap<String, String> = headers
                .iter()
                .cloned()
                .zip(row.iter().map(ToString::to_string))
                .collect();
            record_from_upload(&row, schema)
        })
        .collect())
}

/// Parse a CSV upload with a header row into storage records
pub fn records_from_csv(data: &[u8], schema: &TableSchema) -> Result<Vec<Record>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(data);
    reader
        .deserialize::<IndexMap<String, String>>()
        .map(|row| row.map(|row| record_from_upload(&row, schema)))
        .collect()
}

#[cfg(test)]
mod tests {
    use carmarket_types::{CAR_DATA_SCHEMA, MapValue};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn names_map_both_ways() {
        for (storage, presentation) in FIELD_MAPPING {
            assert_eq!(presentation_name(storage), Some(presentation));
            assert_eq!(storage_name(presentation), Some(storage));
        }
        assert_eq!(presentation_name(columns::CITY), None);
        assert_eq!(storage_name("city_license_plates"), None);
    }

    #[test]
    fn upload_rows_become_storage_records() {
        let csv = "brand,model,guide_price,horsepower,doors,min_price,attention,discount,car_type,\
                   manufacture_year,city,fuel_capacity,historical_price,city_license_plates,colour\n\
                   丰田,凯美瑞,180000.5,178,4.0,170000,640,3.5,轿车,2023,北京,60,\
                   \"{\"\"2025-06\"\":179000}\",\"{'北京':1200,'上海':1000}\",red\n";
        let records = records_from_csv(csv.as_bytes(), &CAR_DATA_SCHEMA).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];

        assert_eq!(record[columns::CAR_BRAND], Value::from("丰田"));
        assert_eq!(record[columns::MANUFACTURER_SUGGESTED_PRICE], Value::from(180000.5));
        assert_eq!(record[columns::NUM_DOORS], Value::from(4));
        assert_eq!(record[columns::MIN_REFERENCE_PRICE], Value::from(170000.0));
        assert_eq!(record[columns::MANUFACTURE_YEAR], Value::from(2023));
        assert_eq!(record[columns::CITY], Value::from("北京"));
        assert_eq!(
            record[columns::HISTORICAL_PRICE],
            Value::from(MapValue::from([("2025-06".to_string(), 179000)]))
        );
        assert_eq!(
            record[columns::CITY_LICENSE_PLATES],
            Value::from(MapValue::from([
                ("北京".to_string(), 1200),
                ("上海".to_string(), 1000),
            ]))
        );
        assert!(!record.contains_key("colour"));
        assert!(!record.contains_key("brand"));
    }

    #[test]
    fn bad_cells_degrade() {
        assert_eq!(coerce_cell("num_doors", "four", ColumnType::Int), Value::Null);
        assert_eq!(coerce_cell("num_doors", "4.5", ColumnType::Int), Value::Null);
        assert_eq!(
            coerce_cell("popularity", " ", ColumnType::Int),
            Value::Null,
            "blank cells are null"
        );
        assert_eq!(
            coerce_cell("fuel_capacity", "NaN", ColumnType::decimal(5, 2)),
            Value::Null
        );
        assert_eq!(
            coerce_cell("city_license_plates", "not json", ColumnType::StringIntMap),
            Value::from(MapValue::new())
        );
    }

    #[test]
    fn header_only_upload_is_empty() {
        let records = records_from_csv(b"brand,model\n", &CAR_DATA_SCHEMA).unwrap();
        assert!(records.is_empty());

        let data = test_util::workbook(&[&["brand", "model"]]);
        let records = records_from_workbook(&data, &CAR_DATA_SCHEMA).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn workbook_rows_become_storage_records() {
        let data = test_util::workbook(&[
            &["brand", "model", "guide_price", "doors", "city", "city_license_plates"],
            &["丰田", "凯美瑞", "180000.5", "4", "北京", "{'北京':1200}"],
            &["", "", "", "", "", ""],
            &["特斯拉", "Model Y", "", "5", "上海", ""],
        ]);
        let records = records_from_workbook(&data, &CAR_DATA_SCHEMA).unwrap();
        assert_eq!(records.len(), 2, "blank rows are skipped");

        assert_eq!(records[0][columns::CAR_BRAND], Value::from("丰田"));
        assert_eq!(records[0][columns::MANUFACTURER_SUGGESTED_PRICE], Value::from(180000.5));
        assert_eq!(records[0][columns::NUM_DOORS], Value::from(4));
        assert_eq!(
            records[0][columns::CITY_LICENSE_PLATES],
            Value::from(MapValue::from([("北京".to_string(), 1200)]))
        );
        assert_eq!(records[1][columns::CAR_MODEL], Value::from("Model Y"));
        assert_eq!(records[1][columns::MANUFACTURER_SUGGESTED_PRICE], Value::Null);
        assert_eq!(records[1][columns::NUM_DOORS], Value::from(5));
    }

    #[test]
    fn upload_formats_follow_extensions() {
        assert_eq!(
            UploadFormat::from_file_name("cars.xlsx"),
            Some(UploadFormat::Workbook)
        );
        assert_eq!(
            UploadFormat::from_file_name("CARS.XLS"),
            Some(UploadFormat::Workbook)
        );
        assert_eq!(
            UploadFormat::from_file_name("cars.csv"),
            Some(UploadFormat::Csv)
        );
        for name in ["cars.txt", "cars", "", "xlsx"] {
            assert_eq!(UploadFormat::from_file_name(name), None, "{name}");
        }
    }

    #[test]
    fn corrupt_workbook_is_an_error() {
        let result = records_from_upload(
            UploadFormat::Workbook,
            b"brand,model\n",
            &CAR_DATA_SCHEMA,
        );
        assert!(matches!(result, Err(UploadError::Workbook(_))), "{result:?}");
    }
}
