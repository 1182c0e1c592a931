use chrono::{Datelike, NaiveDate};
use serde_json::{Map, Value as JsonValue};

use crate::model::{ColumnKind, Value};

/// Unambiguous year-first layouts are tried before the day-first ones.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d %b %Y", "%d %B %Y",
    "%d/%m/%y", "%d-%m-%y", "%d.%m.%y",
];

/// Parses a date using the day-first convention. Any trailing time component
/// is discarded. Returns `None` instead of failing on unrecognised input.
pub fn parse_day_first_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(date) = parse_date_only(trimmed) {
        return Some(date);
    }

    let date_part = trimmed.split([' ', 'T']).next()?;
    if date_part.len() == trimmed.len() {
        return None;
    }
    parse_date_only(date_part)
}

fn parse_date_only(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS.iter().find_map(|format| {
        let date = NaiveDate::parse_from_str(text, format).ok()?;
        // `%Y` happily reads a two-digit year as year 0020.
        if format.contains("%Y") && date.year() < 1000 {
            return None;
        }
        Some(date)
    })
}

pub fn parse_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }

    let float = parse_float(trimmed)?;
    if float.fract() == 0.0 && float >= i64::MIN as f64 && float < i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

pub fn parse_float(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Converts one decoded cell into the column's storage class. Values that do
/// not fit the class become `Value::Null`.
pub fn coerce_cell(kind: ColumnKind, cell: Option<&str>) -> Value {
    let Some(cell) = cell else {
        return Value::Null;
    };

    match kind {
        ColumnKind::Text => Value::Text(cell.to_string()),
        ColumnKind::Integer => parse_integer(cell).map_or(Value::Null, Value::Integer),
        ColumnKind::Float => parse_float(cell).map_or(Value::Null, Value::Float),
        ColumnKind::Date => parse_day_first_date(cell).map_or(Value::Null, Value::Date),
        ColumnKind::Json => serde_json::from_str::<Map<String, JsonValue>>(cell)
            .map_or(Value::Null, Value::Json),
    }
}

/// Best-effort scalar typing for schemaless payload columns.
pub fn infer_scalar(cell: &str) -> Value {
    let trimmed = cell.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Value::Integer(value);
    }
    if let Some(value) = parse_float(trimmed) {
        return Value::Float(value);
    }
    Value::Text(cell.to_string())
}
