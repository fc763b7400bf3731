//! Result cells and row decoding.
//!
//! Backends deliver rows as JSON, either positional arrays or objects keyed by
//! column name. Temporal values may arrive wrapped as
//! `{"$type": "timestamp", "value": "..."}`. Decoding normalizes every cell
//! into a [`CellValue`] in the same pass that delivers the row.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::error::{WarehouseError, WarehouseResult};
use crate::model::types::DimensionType;
use crate::sql::filter_rule::parse_datetime;

/// Key marking a wrapped native value.
const TYPE_TAG: &str = "$type";

/// Date that time-of-day values are anchored to.
const TIME_ANCHOR: &str = "1970-01-01";

/// A normalized result cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    /// Dates, datetimes and timestamps, all in UTC.
    Timestamp(DateTime<Utc>),
    String(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            CellValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

/// Normalize one raw cell from a column of the given canonical type.
pub fn normalize_cell(value: Value, column_type: DimensionType) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::Bool(b) => CellValue::Bool(b),
        Value::Number(n) => CellValue::Number(n),
        Value::String(s) if column_type.is_temporal() => temporal(s),
        Value::String(s) => CellValue::String(s),
        Value::Object(mut map) => match unwrap_native(&mut map) {
            Some(cell) => cell,
            None => CellValue::String(Value::Object(map).to_string()),
        },
        other => CellValue::String(other.to_string()),
    }
}

fn unwrap_native(map: &mut Map<String, Value>) -> Option<CellValue> {
    let tag = map.get(TYPE_TAG)?.as_str()?.to_string();
    let value = match map.remove("value")? {
        Value::String(s) => s,
        Value::Null => return Some(CellValue::Null),
        other => other.to_string(),
    };
    match tag.as_str() {
        "date" | "datetime" | "timestamp" | "time" => Some(temporal(value)),
        _ => Some(CellValue::String(value)),
    }
}

fn temporal(text: String) -> CellValue {
    let trimmed = text.trim();
    let parsed = parse_datetime(trimmed)
        .or_else(|| parse_datetime(&format!("{} {}", TIME_ANCHOR, trimmed)));
    match parsed {
        Some(naive) => CellValue::Timestamp(naive.and_utc()),
        None => CellValue::String(text),
    }
}

/// One result row, in result-column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<CellValue>,
}

impl Row {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<CellValue> {
        self.values
    }

    /// Cell of the named column.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Row {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Per-query decoding context: column names and their canonical types.
#[derive(Debug, Clone)]
pub struct RowDecoder {
    columns: Arc<[String]>,
    types: Vec<DimensionType>,
}

impl RowDecoder {
    pub fn new(fields: &[(String, DimensionType)]) -> Self {
        Self {
            columns: fields.iter().map(|(name, _)| name.clone()).collect(),
            types: fields.iter().map(|(_, t)| *t).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Decode one raw row.
    pub fn decode(&self, raw: Value) -> WarehouseResult<Row> {
        let values = match raw {
            Value::Array(cells) => {
                if cells.len() != self.types.len() {
                    return Err(WarehouseError::query(format!(
                        "Row has {} values but the result has {} columns",
                        cells.len(),
                        self.types.len()
                    )));
                }
                cells
                    .into_iter()
                    .zip(&self.types)
                    .map(|(cell, t)| normalize_cell(cell, *t))
                    .collect()
            }
            Value::Object(mut cells) => self
                .columns
                .iter()
                .zip(&self.types)
                .map(|(name, t)| normalize_cell(cells.remove(name).unwrap_or(Value::Null), *t))
                .collect(),
            other => {
                return Err(WarehouseError::query(format!(
                    "Unexpected row shape from backend: {}",
                    other
                )))
            }
        };
        Ok(Row {
            columns: Arc::clone(&self.columns),
            values,
        })
    }
}
