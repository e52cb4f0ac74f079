//! Flat tabular boundary type.
//!
//! [`Table`] is what leaves the engine: ordered column names plus rows of
//! scalar [`Value`]s. It serializes to JSON as an array of objects (keys in
//! column order) and renders each cell as plain text for CSV.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn text(value: &Option<String>) -> Self {
        value.clone().map(Value::Text).unwrap_or(Value::Null)
    }

    pub fn timestamp(value: Option<NaiveDateTime>) -> Self {
        value.map(Value::Timestamp).unwrap_or(Value::Null)
    }
}

/// Text rendering used for CSV cells. Nulls render as an empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
            Value::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Text(v) => serializer.serialize_str(v),
            Value::Date(_) | Value::Timestamp(_) => serializer.collect_str(self),
        }
    }
}

/// Ordered columns plus rows of cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with nulls, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of one column, or `None` if the column is absent.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }
}

struct RowRef<'a> {
    columns: &'a [String],
    row: &'a [Value],
}

impl Serialize for RowRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.row.iter()) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowRef {
                columns: &self.columns,
                row,
            })?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        let date = NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Date(date).to_string(), "2023-07-01");
        assert_eq!(
            Value::Timestamp(date.and_hms_opt(9, 30, 0).unwrap()).to_string(),
            "2023-07-01 09:30:00"
        );
    }

    #[test]
    fn test_push_row_pads_nulls() {
        let mut table = Table::new(vec!["a".into(), "b".into(), "c".into()]);
        table.push_row(vec![Value::Int(1)]);
        assert_eq!(table.rows[0], vec![Value::Int(1), Value::Null, Value::Null]);
    }

    #[test]
    fn test_json_rows_keep_column_order() {
        let mut table = Table::new(vec!["source".into(), "program_identifier".into()]);
        table.push_row(vec![Value::Text("asset_view".into()), Value::Int(9123)]);
        table.push_row(vec![Value::Null, Value::Int(9124)]);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(
            json,
            r#"[{"source":"asset_view","program_identifier":9123},{"source":null,"program_identifier":9124}]"#
        );
    }

    #[test]
    fn test_column_values() {
        let mut table = Table::new(vec!["x".into()]);
        table.push_row(vec![Value::Int(3)]);
        assert_eq!(table.column_values("x"), Some(vec![&Value::Int(3)]));
        assert!(table.column_values("y").is_none());
    }
}
