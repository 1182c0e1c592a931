use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::errors::ParserError;

/// Storage class of one destination column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Date,
    Json,
}

impl ColumnKind {
    /// Postgres array type the column is bound as when a batch is unnested.
    pub fn array_type(&self) -> &'static str {
        match self {
            ColumnKind::Text | ColumnKind::Json => "text[]",
            ColumnKind::Integer => "bigint[]",
            ColumnKind::Float => "double precision[]",
            ColumnKind::Date => "date[]",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Date => "date",
            ColumnKind::Json => "json",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

/// Canonical, ordered column set of one destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub table: &'static str,
    pub columns: &'static [ColumnSpec],
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|column| column.name).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Json(Map<String, JsonValue>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Renders the value as text, for binding into a text column.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(text) => Some(text.clone()),
            Value::Integer(value) => Some(value.to_string()),
            Value::Float(value) => Some(value.to_string()),
            Value::Date(date) => Some(date.format("%Y-%m-%d").to_string()),
            Value::Json(map) => Some(JsonValue::Object(map.clone()).to_string()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Text(text) => JsonValue::String(text.clone()),
            Value::Integer(value) => JsonValue::from(*value),
            Value::Float(value) => JsonValue::from(*value),
            Value::Date(date) => JsonValue::String(date.format("%Y-%m-%d").to_string()),
            Value::Json(map) => JsonValue::Object(map.clone()),
        }
    }
}

static NULL: Value = Value::Null;

/// A decoded CSV file. `None` cells held a null sentinel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRow {
    pub values: Vec<Value>,
}

impl CanonicalRow {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, schema: &TableSchema, name: &str) -> Option<&Value> {
        schema.position(name).and_then(|idx| self.values.get(idx))
    }
}

/// Rows produced from one source file, ready for a single bulk write.
#[derive(Debug, Clone)]
pub struct TableBatch {
    pub schema: TableSchema,
    pub source_file: String,
    pub rows: Vec<CanonicalRow>,
}

impl TableBatch {
    pub fn new(
        schema: TableSchema,
        source_file: impl Into<String>,
        rows: Vec<CanonicalRow>,
    ) -> Result<Self, ParserError> {
        if let Some(row) = rows.iter().find(|row| row.values.len() != schema.width()) {
            return Err(ParserError::SchemaMismatch {
                table: schema.table,
                expected: schema.width(),
                found: row.values.len(),
            });
        }

        Ok(Self {
            schema,
            source_file: source_file.into(),
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column across all rows, in row order. Cells missing from
    /// a short row read as null.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows
            .iter()
            .map(move |row| row.values.get(index).unwrap_or(&NULL))
    }
}
