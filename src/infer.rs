//! Schema inference for sources that do not carry a typed schema.
//!
//! Text cells (delimited files) are typed by trying `Int64`, then `Float64`, then `Bool`, and
//! falling back to `Utf8`. JSON records and typed cells from databases are unified per column.

use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Infer a typed [`DataSet`] from a header row and string records.
///
/// Surrounding whitespace is ignored for typing. Empty cells become [`Value::Null`], as do
/// blank cells in non-text columns; text cells keep their padding. A column with no non-blank
/// cell is `Utf8`. Short records are padded with nulls.
pub fn infer_from_text(headers: Vec<String>, records: Vec<Vec<String>>) -> DataSet {
    let types: Vec<DataType> = (0..headers.len())
        .map(|col| infer_text_column(records.iter().map(|r| r.get(col).map(String::as_str))))
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            types
                .iter()
                .enumerate()
                .map(|(col, ty)| text_to_value(record.get(col).map(String::as_str), *ty))
                .collect()
        })
        .collect();

    let fields = headers
        .into_iter()
        .zip(types)
        .map(|(name, ty)| Field::new(name, ty))
        .collect();
    DataSet::new(Schema::new(fields), rows)
}

fn infer_text_column<'a>(cells: impl Iterator<Item = Option<&'a str>> + Clone) -> DataType {
    let non_empty = || {
        cells
            .clone()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    if non_empty().next().is_none() {
        return DataType::Utf8;
    }
    if non_empty().all(|s| s.parse::<i64>().is_ok()) {
        DataType::Int64
    } else if non_empty().all(|s| s.parse::<f64>().is_ok()) {
        DataType::Float64
    } else if non_empty().all(|s| parse_text_bool(s).is_some()) {
        DataType::Bool
    } else {
        DataType::Utf8
    }
}

fn parse_text_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn text_to_value(cell: Option<&str>, ty: DataType) -> Value {
    let raw = match cell {
        None | Some("") => return Value::Null,
        Some(s) => s,
    };
    // Padding is ignored when typing a cell, but text keeps it.
    if ty == DataType::Utf8 {
        return Value::Utf8(raw.to_string());
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    // Column types were inferred from these same cells, so the parses below succeed.
    match ty {
        DataType::Int64 => trimmed.parse().map(Value::Int64).unwrap_or(Value::Null),
        DataType::Float64 => trimmed.parse().map(Value::Float64).unwrap_or(Value::Null),
        DataType::Bool => parse_text_bool(trimmed).map(Value::Bool).unwrap_or(Value::Null),
        DataType::Utf8 => Value::Utf8(raw.to_string()),
    }
}

/// Infer a [`DataSet`] from JSON objects.
///
/// Columns appear in first-seen key order across records; a key missing from a record is
/// `Null` in that row.
pub fn infer_from_json_records(
    records: &[serde_json::Map<String, serde_json::Value>],
) -> DataSet {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
    }

    let columns: Vec<Vec<Value>> = names
        .iter()
        .map(|name| {
            records
                .iter()
                .map(|r| r.get(name).map(json_to_value).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    from_columns(names, columns)
}

/// Map a JSON scalar onto a [`Value`]. Arrays and objects become their JSON text.
pub fn json_to_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int64(i),
            None => n.as_f64().map(Value::Float64).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::Utf8(s.clone()),
        other => Value::Utf8(other.to_string()),
    }
}

/// Build a [`DataSet`] from named columns of already-typed values, unifying each column to a
/// single [`DataType`].
///
/// `Int64` mixed with `Float64` widens to `Float64`; any other mix becomes `Utf8`.
pub fn from_columns(names: Vec<String>, mut columns: Vec<Vec<Value>>) -> DataSet {
    let mut fields = Vec::with_capacity(names.len());
    for (name, column) in names.into_iter().zip(columns.iter_mut()) {
        let ty = unify_column(column);
        fields.push(Field::new(name, ty));
    }

    let row_count = columns.first().map(Vec::len).unwrap_or(0);
    let mut rows: Vec<Vec<Value>> = (0..row_count)
        .map(|_| Vec::with_capacity(columns.len()))
        .collect();
    for column in columns {
        for (row, value) in rows.iter_mut().zip(column) {
            row.push(value);
        }
    }
    DataSet::new(Schema::new(fields), rows)
}

fn unify_column(column: &mut [Value]) -> DataType {
    let mut seen: Option<DataType> = None;
    for v in column.iter() {
        let ty = match v {
            Value::Null => continue,
            Value::Int64(_) => DataType::Int64,
            Value::Float64(_) => DataType::Float64,
            Value::Bool(_) => DataType::Bool,
            Value::Utf8(_) => DataType::Utf8,
        };
        seen = Some(match (seen, ty) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(DataType::Int64), DataType::Float64) | (Some(DataType::Float64), DataType::Int64) => {
                DataType::Float64
            }
            _ => DataType::Utf8,
        });
    }

    let ty = seen.unwrap_or(DataType::Utf8);
    for v in column.iter_mut() {
        let coerced = match (ty, &*v) {
            (_, Value::Null) => None,
            (DataType::Float64, Value::Int64(i)) => Some(Value::Float64(*i as f64)),
            (DataType::Utf8, Value::Int64(i)) => Some(Value::Utf8(i.to_string())),
            (DataType::Utf8, Value::Float64(f)) => Some(Value::Utf8(f.to_string())),
            (DataType::Utf8, Value::Bool(b)) => Some(Value::Utf8(b.to_string())),
            _ => None,
        };
        if let Some(c) = coerced {
            *v = c;
        }
    }
    ty
}
