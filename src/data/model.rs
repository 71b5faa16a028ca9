use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::config::ColumnMapping;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Value – a single cell of any column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value.
/// Category buckets and filters key on `Value`, so it must be `Ord` and `Hash`.
#[derive(Debug, Clone)]
pub enum Value {
    Text(String),
    Number(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Null,
}

// -- Manual Eq/Ord/Hash so we can put Value in BTreeSet / HashMap --
// All three agree: numbers compare by `total_cmp` with `-0.0` folded into `0.0`.

fn canonical(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Number(_) => 2,
                Timestamp(_) => 3,
                Text(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Number(a), Number(b)) => canonical(*a).total_cmp(&canonical(*b)),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Text(s) => s.hash(state),
            Value::Number(f) => canonical(*f).to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Timestamp(t) => t.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Number(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Value::Null => write!(f, "<null>"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            Value::Number(v) => serializer.serialize_f64(*v),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Timestamp(_) => serializer.serialize_str(&self.to_string()),
            Value::Null => serializer.serialize_none(),
        }
    }
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Text,
    Bool,
    Timestamp,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Text => "text",
            ColumnType::Bool => "bool",
            ColumnType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Typed, nullable column storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Bool(Vec<Option<bool>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Numeric(_) => ColumnType::Numeric,
            ColumnData::Text(_) => ColumnType::Text,
            ColumnData::Bool(_) => ColumnType::Bool,
            ColumnData::Timestamp(_) => ColumnType::Timestamp,
        }
    }

    /// Cell at `row` as a [`Value`]. Out-of-range rows read as `Null`.
    pub fn get(&self, row: usize) -> Value {
        match self {
            ColumnData::Numeric(v) => v.get(row).copied().flatten().map_or(Value::Null, Value::Number),
            ColumnData::Text(v) => v
                .get(row)
                .and_then(|s| s.clone())
                .map_or(Value::Null, Value::Text),
            ColumnData::Bool(v) => v.get(row).copied().flatten().map_or(Value::Null, Value::Bool),
            ColumnData::Timestamp(v) => v
                .get(row)
                .copied()
                .flatten()
                .map_or(Value::Null, Value::Timestamp),
        }
    }

    /// Out-of-range rows are null, as in [`ColumnData::get`].
    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnData::Numeric(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Text(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Bool(v) => v.get(row).map_or(true, Option::is_none),
            ColumnData::Timestamp(v) => v.get(row).map_or(true, Option::is_none),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_null(i)).count()
    }

    fn take(&self, indices: &[usize]) -> ColumnData {
        fn pick<T: Clone>(v: &[T], indices: &[usize]) -> Vec<T> {
            indices.iter().map(|&i| v[i].clone()).collect()
        }
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(pick(v, indices)),
            ColumnData::Text(v) => ColumnData::Text(pick(v, indices)),
            ColumnData::Bool(v) => ColumnData::Bool(pick(v, indices)),
            ColumnData::Timestamp(v) => ColumnData::Timestamp(pick(v, indices)),
        }
    }
}

/// Lowercase, trimmed, with whitespace and `-` folded to `_`.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: &str, data: ColumnData) -> Self {
        Self {
            name: normalize_column_name(name),
            data,
        }
    }

    pub fn numeric(name: &str, values: Vec<Option<f64>>) -> Self {
        Self::new(name, ColumnData::Numeric(values))
    }

    pub fn text(name: &str, values: Vec<Option<String>>) -> Self {
        Self::new(name, ColumnData::Text(values))
    }

    pub fn bool(name: &str, values: Vec<Option<bool>>) -> Self {
        Self::new(name, ColumnData::Bool(values))
    }

    pub fn timestamp(name: &str, values: Vec<Option<NaiveDateTime>>) -> Self {
        Self::new(name, ColumnData::Timestamp(values))
    }

    pub fn column_type(&self) -> ColumnType {
        self.data.column_type()
    }
}

// ---------------------------------------------------------------------------
// EventRecord – typed view of one row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub timestamp: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub magnitude: Option<f64>,
    pub depth: Option<f64>,
    pub country: Option<String>,
    pub continent: Option<String>,
    pub location: Option<String>,
    pub tsunami: Option<bool>,
}

// ---------------------------------------------------------------------------
// Table – the complete loaded dataset
// ---------------------------------------------------------------------------

/// Ordered columns of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(Error::Load(format!("duplicate column '{}'", col.name)));
            }
        }
        if let Some(first) = columns.first() {
            let rows = first.data.len();
            if let Some(bad) = columns.iter().find(|c| c.data.len() != rows) {
                return Err(Error::Load(format!(
                    "column '{}' has {} rows, expected {rows}",
                    bad.name,
                    bad.data.len()
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn schema(&self) -> Vec<(String, ColumnType)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.column_type()))
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_ok()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        let key = normalize_column_name(name);
        self.columns
            .iter()
            .find(|c| c.name == key)
            .ok_or(Error::ColumnNotFound(key))
    }

    /// Values of a numeric column.
    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        let col = self.column(name)?;
        match &col.data {
            ColumnData::Numeric(v) => Ok(v),
            other => Err(Error::InvalidParameter(format!(
                "column '{}' is {}, expected numeric",
                col.name,
                other.column_type()
            ))),
        }
    }

    pub fn timestamps(&self, name: &str) -> Result<&[Option<NaiveDateTime>]> {
        let col = self.column(name)?;
        match &col.data {
            ColumnData::Timestamp(v) => Ok(v),
            other => Err(Error::InvalidParameter(format!(
                "column '{}' is {}, expected timestamp",
                col.name,
                other.column_type()
            ))),
        }
    }

    /// All numeric columns, in schema order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.columns.iter().filter_map(|c| match &c.data {
            ColumnData::Numeric(v) => Some((c.name.as_str(), v.as_slice())),
            _ => None,
        })
    }

    pub fn row(&self, index: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.data.get(index)).collect()
    }

    /// New table holding the given rows, in the given order.
    pub fn take(&self, indices: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.take(indices),
                })
                .collect(),
        }
    }

    pub fn record(&self, index: usize, mapping: &ColumnMapping) -> EventRecord {
        let number = |name: &str| self.cell(name, index).as_f64();
        let text = |name: &Option<String>| {
            name.as_deref().and_then(|n| match self.cell(n, index) {
                Value::Null => None,
                Value::Text(s) => Some(s),
                other => Some(other.to_string()),
            })
        };
        EventRecord {
            timestamp: match self.cell(&mapping.timestamp, index) {
                Value::Timestamp(t) => Some(t),
                _ => None,
            },
            latitude: number(&mapping.latitude),
            longitude: number(&mapping.longitude),
            magnitude: number(&mapping.magnitude),
            depth: number(&mapping.depth),
            country: text(&mapping.country),
            continent: text(&mapping.continent),
            location: text(&mapping.location),
            tsunami: mapping
                .tsunami
                .as_deref()
                .and_then(|n| match self.cell(n, index) {
                    Value::Bool(b) => Some(b),
                    Value::Number(v) => Some(v != 0.0),
                    _ => None,
                }),
        }
    }

    fn cell(&self, name: &str, index: usize) -> Value {
        self.column(name)
            .map_or(Value::Null, |c| c.data.get(index))
    }
}

/// Serialized as a sequence of `{column: value}` rows.
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Row<'a>(&'a Table, usize);

        impl Serialize for Row<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.width()))?;
                for col in &self.0.columns {
                    map.serialize_entry(&col.name, &col.data.get(self.1))?;
                }
                map.end()
            }
        }

        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for i in 0..self.len() {
            seq.serialize_element(&Row(self, i))?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(vec![
            Column::numeric("Magnitude", vec![Some(4.2), None, Some(5.0)]),
            Column::text(
                "Country",
                vec![Some("Chile".into()), Some("Japan".into()), None],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn column_names_are_normalized() {
        assert_eq!(normalize_column_name("  Date Time "), "date_time");
        assert_eq!(normalize_column_name("mag-Type"), "mag_type");
        let table = sample();
        assert_eq!(table.column_names(), vec!["magnitude", "country"]);
        assert!(table.column("MAGNITUDE").is_ok());
    }

    #[test]
    fn missing_column_is_reported() {
        let err = sample().column("depth").unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound(name) if name == "depth"));
    }

    #[test]
    fn numeric_rejects_text_columns() {
        assert!(matches!(
            sample().numeric("country"),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let err = Table::new(vec![
            Column::numeric("a", vec![Some(1.0)]),
            Column::numeric("b", vec![Some(1.0), Some(2.0)]),
        ]);
        assert!(matches!(err, Err(Error::Load(_))));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = Table::new(vec![
            Column::numeric("Depth", vec![Some(1.0)]),
            Column::numeric("depth", vec![Some(1.0)]),
        ]);
        assert!(matches!(err, Err(Error::Load(_))));
    }

    #[test]
    fn take_preserves_requested_order() {
        let table = sample().take(&[2, 0]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.row(0), vec![Value::Number(5.0), Value::Null]);
        assert_eq!(
            table.row(1),
            vec![Value::Number(4.2), Value::Text("Chile".into())]
        );
    }

    #[test]
    fn value_ordering_groups_by_kind() {
        let mut values = vec![
            Value::Text("b".into()),
            Value::Number(2.0),
            Value::Null,
            Value::Number(-1.0),
            Value::Bool(true),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Number(-1.0),
                Value::Number(2.0),
                Value::Text("b".into()),
            ]
        );
    }

    #[test]
    fn signed_zeros_share_a_key() {
        use std::collections::{BTreeSet, HashSet};

        assert_eq!(Value::Number(0.0), Value::Number(-0.0));
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        let hashed: HashSet<Value> = [Value::Number(0.0), Value::Number(-0.0)].into();
        let ordered: BTreeSet<Value> = [Value::Number(-0.0), Value::Number(0.0)].into();
        assert_eq!(hashed.len(), 1);
        assert_eq!(ordered.len(), 1);
    }

    #[test]
    fn out_of_range_rows_are_null() {
        let table = sample();
        let magnitude = &table.column("magnitude").unwrap().data;
        assert!(!magnitude.is_null(0));
        assert!(magnitude.is_null(1));
        assert!(magnitude.is_null(99));
        assert_eq!(magnitude.get(99), Value::Null);
    }

    #[test]
    fn record_reads_mapped_columns() {
        let table = sample();
        let mapping = ColumnMapping::default();
        let rec = table.record(0, &mapping);
        assert_eq!(rec.magnitude, Some(4.2));
        assert_eq!(rec.country.as_deref(), Some("Chile"));
        assert_eq!(rec.latitude, None);
        assert_eq!(rec.tsunami, None);
    }

    #[test]
    fn serializes_as_rows() {
        let json = serde_json::to_value(sample().take(&[0])).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "magnitude": 4.2, "country": "Chile" }])
        );
    }
}
