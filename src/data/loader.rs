use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, AsArray, BooleanArray, Float64Array, TimestampMillisecondArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, TimeUnit};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{normalize_column_name, Column, ColumnData, Table};
use crate::config::ColumnMapping;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load an event table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – comma-delimited text with a header row
/// * `.tsv`          – tab-delimited text with a header row
/// * `.parquet`      – flat scalar columns
/// * `.json`         – `[{ "magnitude": 6.5, "country": "Chile", ... }, ...]`
pub fn load_file(path: &Path, mapping: &ColumnMapping) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" | "txt" => load_delimited(std::fs::File::open(path)?, b',', mapping),
        "tsv" => load_delimited(std::fs::File::open(path)?, b'\t', mapping),
        "parquet" | "pq" => load_parquet(path, mapping),
        "json" => load_json(path, mapping),
        other => Err(Error::Load(format!("unsupported file extension: .{other}"))),
    }?;

    log::info!(
        "Loaded {} rows from {} with columns {:?}",
        table.len(),
        path.display(),
        table.column_names()
    );
    Ok(table)
}

/// Parse delimited text with a header row from any byte stream.
pub fn load_delimited<R: Read>(reader: R, delimiter: u8, mapping: &ColumnMapping) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(Error::Load("missing header row".into()));
    }

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|e| Error::Load(format!("row {row_no}: {e}")))?;
        for (col, cell) in raw.iter_mut().zip(record.iter()) {
            col.push(null_or_text(cell));
        }
    }

    build_table(headers.into_iter().zip(raw).collect(), mapping)
}

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

const NULL_TOKENS: &[&str] = &["", "na", "n/a", "nan", "null", "none"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d-%m-%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y"];

fn null_or_text(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    if NULL_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t)) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a timestamp in any of the accepted layouts. Unparsable input is `None`.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Flag parsing for the designated tsunami column: also accepts `0/1` and `yes/no`.
fn parse_flag(s: &str) -> Option<bool> {
    if let Some(b) = parse_bool(s) {
        return Some(b);
    }
    match s.to_ascii_lowercase().as_str() {
        "yes" | "y" => Some(true),
        "no" | "n" => Some(false),
        other => other.parse::<f64>().ok().filter(|v| !v.is_nan()).map(|v| v != 0.0),
    }
}

/// Pick a column type from the raw cells and convert.
fn infer_column(raw: Vec<Option<String>>) -> ColumnData {
    let present = || raw.iter().flatten();
    if present().next().is_some() && present().all(|s| parse_bool(s).is_some()) {
        return ColumnData::Bool(raw.iter().map(|c| c.as_deref().and_then(parse_bool)).collect());
    }
    if present().all(|s| s.parse::<f64>().is_ok()) {
        return ColumnData::Numeric(
            raw.iter()
                .map(|c| c.as_deref().and_then(|s| s.parse().ok()))
                .collect(),
        );
    }
    ColumnData::Text(raw)
}

fn build_column(name: &str, raw: Vec<Option<String>>, mapping: &ColumnMapping) -> Column {
    let key = normalize_column_name(name);
    let is = |configured: &str| normalize_column_name(configured) == key;

    if is(&mapping.timestamp) {
        let parsed: Vec<Option<NaiveDateTime>> = raw
            .iter()
            .map(|c| c.as_deref().and_then(parse_timestamp))
            .collect();
        let coerced = raw
            .iter()
            .zip(&parsed)
            .filter(|(r, p)| r.is_some() && p.is_none())
            .count();
        if coerced > 0 {
            log::warn!("{coerced} unparsable timestamps in '{key}' coerced to null");
        }
        return Column::timestamp(name, parsed);
    }
    if mapping.tsunami.as_deref().is_some_and(is) {
        return Column::bool(
            name,
            raw.iter().map(|c| c.as_deref().and_then(parse_flag)).collect(),
        );
    }
    Column::new(name, infer_column(raw))
}

fn build_table(raw_columns: Vec<(String, Vec<Option<String>>)>, mapping: &ColumnMapping) -> Result<Table> {
    let columns = raw_columns
        .into_iter()
        .map(|(name, raw)| build_column(&name, raw, mapping))
        .collect();
    let mut table = Table::new(columns)?;
    null_non_finite(&mut table);
    enforce_ranges(&mut table, mapping);
    Ok(table)
}

/// Null out NaN and infinite cells in every numeric column.
///
/// `str::parse::<f64>` and Arrow float columns both admit them, and no
/// statistic downstream has a meaning for them.
fn null_non_finite(table: &mut Table) {
    for col in table.columns_mut() {
        let ColumnData::Numeric(values) = &mut col.data else {
            continue;
        };
        let mut coerced = 0;
        for v in values.iter_mut() {
            if v.is_some_and(|x| !x.is_finite()) {
                *v = None;
                coerced += 1;
            }
        }
        if coerced > 0 {
            log::warn!("{coerced} non-finite values in '{}' coerced to null", col.name);
        }
    }
}

/// Null out mapped coordinate / magnitude / depth cells outside their valid range.
fn enforce_ranges(table: &mut Table, mapping: &ColumnMapping) {
    let bounds = [
        (normalize_column_name(&mapping.latitude), -90.0, 90.0),
        (normalize_column_name(&mapping.longitude), -180.0, 180.0),
        (normalize_column_name(&mapping.magnitude), 0.0, f64::INFINITY),
        (normalize_column_name(&mapping.depth), 0.0, f64::INFINITY),
    ];
    for col in table.columns_mut() {
        let Some((_, lo, hi)) = bounds.iter().find(|(name, _, _)| *name == col.name) else {
            continue;
        };
        let ColumnData::Numeric(values) = &mut col.data else {
            continue;
        };
        let mut coerced = 0;
        for v in values.iter_mut() {
            if v.is_some_and(|x| !(*lo..=*hi).contains(&x)) {
                *v = None;
                coerced += 1;
            }
        }
        if coerced > 0 {
            log::warn!(
                "{coerced} values in '{}' outside [{lo}, {hi}] coerced to null",
                col.name
            );
        }
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON (the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "magnitude": 7.0, "depth": 14.0, "country": "Vanuatu" },
///   ...
/// ]
/// ```
/// Keys missing from a record read as null.
fn load_json(path: &Path, mapping: &ColumnMapping) -> Result<Table> {
    let text = std::fs::read_to_string(path)?;
    let root: JsonValue =
        serde_json::from_str(&text).map_err(|e| Error::Load(format!("parsing JSON: {e}")))?;
    let records = root
        .as_array()
        .ok_or_else(|| Error::Load("expected top-level JSON array".into()))?;

    let mut names: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| Error::Load(format!("row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let raw_columns = names
        .into_iter()
        .map(|name| {
            let cells = records
                .iter()
                .map(|rec| rec.get(&name).and_then(json_to_text))
                .collect();
            (name, cells)
        })
        .collect();
    build_table(raw_columns, mapping)
}

fn json_to_text(val: &JsonValue) -> Option<String> {
    match val {
        JsonValue::Null => None,
        JsonValue::String(s) => null_or_text(s),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of flat scalar columns.
///
/// Integer and float columns become numeric, booleans bool, Arrow
/// timestamps and dates become timestamps, strings text. The designated
/// timestamp column may also be stored as strings.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path, mapping: &ColumnMapping) -> Result<Table> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::Load(format!("reading parquet metadata: {e}")))?;
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|e| Error::Load(format!("building parquet reader: {e}")))?;

    let timestamp_key = normalize_column_name(&mapping.timestamp);
    let tsunami_key = mapping.tsunami.as_deref().map(normalize_column_name);

    let mut columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|field| {
            let key = normalize_column_name(field.name());
            let data = if key == timestamp_key {
                ColumnData::Timestamp(Vec::new())
            } else if tsunami_key.as_deref() == Some(key.as_str()) {
                ColumnData::Bool(Vec::new())
            } else {
                empty_for(field.data_type())
            };
            Column::new(field.name(), data)
        })
        .collect();

    for batch_result in reader {
        let batch = batch_result.map_err(|e| Error::Load(format!("reading parquet batch: {e}")))?;
        for (col, array) in columns.iter_mut().zip(batch.columns()) {
            append_arrow(&mut col.data, array)
                .map_err(|e| Error::Load(format!("column '{}': {e}", col.name)))?;
        }
    }

    let mut table = Table::new(columns)?;
    null_non_finite(&mut table);
    enforce_ranges(&mut table, mapping);
    Ok(table)
}

// -- Parquet / Arrow helpers --

fn empty_for(data_type: &DataType) -> ColumnData {
    match data_type {
        DataType::Boolean => ColumnData::Bool(Vec::new()),
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
            ColumnData::Timestamp(Vec::new())
        }
        dt if dt.is_numeric() => ColumnData::Numeric(Vec::new()),
        _ => ColumnData::Text(Vec::new()),
    }
}

fn append_arrow(acc: &mut ColumnData, array: &Arc<dyn Array>) -> std::result::Result<(), String> {
    let dt = array.data_type();
    match acc {
        ColumnData::Numeric(out) => {
            let floats = cast(array, &DataType::Float64).map_err(|e| e.to_string())?;
            let floats = floats
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or("expected Float64Array after cast")?;
            out.extend(floats.iter());
        }
        ColumnData::Bool(out) => {
            if let Some(bools) = array.as_any().downcast_ref::<BooleanArray>() {
                out.extend(bools.iter());
            } else if dt.is_numeric() {
                let floats = cast(array, &DataType::Float64).map_err(|e| e.to_string())?;
                let floats = floats
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or("expected Float64Array after cast")?;
                out.extend(floats.iter().map(|v| v.map(|x| x != 0.0)));
            } else {
                out.extend(string_cells(array)?.into_iter().map(|c| c.as_deref().and_then(parse_flag)));
            }
        }
        ColumnData::Timestamp(out) => match dt {
            DataType::Utf8 | DataType::LargeUtf8 => {
                out.extend(
                    string_cells(array)?
                        .into_iter()
                        .map(|c| c.as_deref().and_then(parse_timestamp)),
                );
            }
            _ => {
                let millis = cast(array, &DataType::Timestamp(TimeUnit::Millisecond, None))
                    .map_err(|e| e.to_string())?;
                let millis = millis
                    .as_any()
                    .downcast_ref::<TimestampMillisecondArray>()
                    .ok_or("expected TimestampMillisecondArray after cast")?;
                out.extend(millis.iter().map(|v| {
                    v.and_then(DateTime::<Utc>::from_timestamp_millis)
                        .map(|t| t.naive_utc())
                }));
            }
        },
        ColumnData::Text(out) => out.extend(string_cells(array)?),
    }
    Ok(())
}

fn string_cells(array: &Arc<dyn Array>) -> std::result::Result<Vec<Option<String>>, String> {
    let strings = match array.data_type() {
        DataType::Utf8 => array.as_string::<i32>().iter().map(|s| s.and_then(null_or_text)).collect(),
        DataType::LargeUtf8 => array.as_string::<i64>().iter().map(|s| s.and_then(null_or_text)).collect(),
        _ => {
            let utf8 = cast(array, &DataType::Utf8).map_err(|e| e.to_string())?;
            utf8.as_string::<i32>().iter().map(|s| s.and_then(null_or_text)).collect()
        }
    };
    Ok(strings)
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;
    use crate::data::model::{ColumnType, Value};

    fn load(text: &str) -> Result<Table> {
        load_delimited(text.as_bytes(), b',', &ColumnMapping::default())
    }

    #[test]
    fn infers_column_types() {
        let table = load(
            "magnitude,Country,date_time,tsunami,flag\n\
             7.0,Chile,16-08-2023 12:47,1,true\n\
             6.9,,2023-07-19 00:22:31,0,false\n",
        )
        .unwrap();
        assert_eq!(
            table.schema(),
            vec![
                ("magnitude".to_string(), ColumnType::Numeric),
                ("country".to_string(), ColumnType::Text),
                ("date_time".to_string(), ColumnType::Timestamp),
                ("tsunami".to_string(), ColumnType::Bool),
                ("flag".to_string(), ColumnType::Bool),
            ]
        );
        assert_eq!(table.row(1)[1], Value::Null);
        assert_eq!(table.row(0)[3], Value::Bool(true));
    }

    #[test]
    fn unparsable_dates_become_null() {
        let table = load("date_time,magnitude\nnot a date,5.0\n2001-03-04,4.0\n").unwrap();
        let ts = table.timestamps("date_time").unwrap();
        assert_eq!(ts[0], None);
        let parsed = ts[1].unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2001, 3, 4));
    }

    #[test]
    fn parses_common_timestamp_layouts() {
        let t = parse_timestamp("16-08-2023 12:47").unwrap();
        assert_eq!((t.year(), t.month(), t.day(), t.hour()), (2023, 8, 16, 12));
        let t = parse_timestamp("2023-08-16T12:47:00Z").unwrap();
        assert_eq!(t.minute(), 47);
        assert!(parse_timestamp("16/16/2023").is_none());
    }

    #[test]
    fn null_tokens_are_recognized() {
        let table = load("depth\nNaN\nNA\n\n12.5\n").unwrap();
        assert_eq!(table.numeric("depth").unwrap(), &[None, None, Some(12.5)]);
    }

    #[test]
    fn non_finite_numbers_become_null() {
        let table = load("magnitude,cdi,felt\n5.0,1,inf\n6.0,-nan,+NaN\n7.0,3,-infinity\n").unwrap();
        assert_eq!(table.numeric("cdi").unwrap(), &[Some(1.0), None, Some(3.0)]);
        assert_eq!(table.column("felt").unwrap().column_type(), ColumnType::Numeric);
        assert_eq!(table.column("felt").unwrap().data.null_count(), 3);
    }

    #[test]
    fn nan_flags_are_null() {
        let table = load("tsunami\n1\n-nan\n0\n").unwrap();
        assert_eq!(table.row(1)[0], Value::Null);
        assert_eq!(table.row(2)[0], Value::Bool(false));
    }

    #[test]
    fn out_of_range_coordinates_are_nulled() {
        let table = load("latitude,longitude,depth\n95,10,-3\n45,-200,10\n").unwrap();
        assert_eq!(table.numeric("latitude").unwrap(), &[None, Some(45.0)]);
        assert_eq!(table.numeric("longitude").unwrap(), &[Some(10.0), None]);
        assert_eq!(table.numeric("depth").unwrap(), &[None, Some(10.0)]);
    }

    #[test]
    fn ragged_rows_fail_to_load() {
        assert!(matches!(load("a,b\n1,2\n3\n"), Err(Error::Load(_))));
    }

    #[test]
    fn empty_input_fails_to_load() {
        assert!(matches!(load(""), Err(Error::Load(_))));
    }

    #[test]
    fn header_only_yields_empty_table() {
        let table = load("magnitude,depth\n").unwrap();
        assert_eq!(table.width(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn tab_delimited_streams_load() {
        let table =
            load_delimited("Latitude\tLongitude\n1.5\t2.5\n".as_bytes(), b'\t', &ColumnMapping::default())
                .unwrap();
        assert_eq!(table.numeric("latitude").unwrap(), &[Some(1.5)]);
    }
}
