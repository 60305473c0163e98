//! JSON driver.
//!
//! Supported inputs:
//! - A JSON array of objects: `[{"a":1}, {"a":2}]` (the `records` layout)
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`, selected with the `lines` config key
//!
//! With a configured schema, nested fields are supported using dot paths in schema field names
//! (e.g. `user.name`). Without one, columns are inferred from the records' keys.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::config::{opt_bool, opt_str, opt_u64, Options, SourceConfig};
use crate::error::{SourceError, SourceResult};
use crate::infer;
use crate::types::{DataSet, DataType, Schema, Value};

use super::{ensure_parent_dir, SourceDriver, SourceKind};

const BACKEND: &str = "json";

/// Reads and writes `.json` files.
#[derive(Debug, Clone, Default)]
pub struct JsonDriver {
    config: SourceConfig,
}

impl JsonDriver {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn lines(&self) -> SourceResult<bool> {
        Ok(self.config.bool_key(BACKEND, "lines")?.unwrap_or(false))
    }
}

impl SourceDriver for JsonDriver {
    fn kind(&self) -> SourceKind {
        SourceKind::Json
    }

    fn read(&self, location: &str) -> SourceResult<DataSet> {
        let text = fs::read_to_string(location)?;
        read_json_str(&text, self.lines()?, &self.config.options, self.config.schema.as_ref())
    }

    fn write(&self, table: &DataSet, location: &str) -> SourceResult<()> {
        let path = Path::new(location);
        ensure_parent_dir(path)?;
        let mut out = BufWriter::new(File::create(path)?);
        write_json(&mut out, table, self.lines()?, &self.config.write_options)?;
        out.flush()?;
        Ok(())
    }
}

/// Parse JSON text into a [`DataSet`].
///
/// When `lines` is false the input is parsed as one document (an array of objects or a single
/// object), falling back to NDJSON if it does not parse as one. Read options: `lines`,
/// `orient` (only `records`).
pub fn read_json_str(
    input: &str,
    lines: bool,
    options: &Options,
    schema: Option<&Schema>,
) -> SourceResult<DataSet> {
    let mut lines = lines;
    for key in options.keys() {
        match key.as_str() {
            "lines" => lines = opt_bool(options, BACKEND, key)?.unwrap_or(lines),
            "orient" => check_orient(options, key)?,
            other => return Err(unsupported_option(other)),
        }
    }

    let values = if lines {
        parse_ndjson(input)?
    } else {
        parse_document(input)?
    };
    table_from_values(&values, schema)
}

/// Build a [`DataSet`] from JSON objects, either against `schema` or by inference.
pub fn table_from_values(values: &[serde_json::Value], schema: Option<&Schema>) -> SourceResult<DataSet> {
    match schema {
        Some(schema) => ingest_json_values(values, schema),
        None => {
            let mut records = Vec::with_capacity(values.len());
            for (idx0, v) in values.iter().enumerate() {
                let obj = v.as_object().ok_or_else(|| SourceError::SchemaMismatch {
                    message: format!("row {} is not a json object", idx0 + 1),
                })?;
                records.push(obj.clone());
            }
            Ok(infer::infer_from_json_records(&records))
        }
    }
}

fn parse_document(input: &str) -> SourceResult<Vec<serde_json::Value>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SourceError::SchemaMismatch {
            message: "json input is empty".to_string(),
        });
    }

    // First try parsing as a single JSON value (array or object).
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => Ok(items),
        Ok(v @ serde_json::Value::Object(_)) => Ok(vec![v]),
        Ok(_) => Err(SourceError::SchemaMismatch {
            message: "json must be an object, an array of objects, or NDJSON".to_string(),
        }),
        Err(_) => parse_ndjson(trimmed),
    }
}

fn parse_ndjson(input: &str) -> SourceResult<Vec<serde_json::Value>> {
    let mut values = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
            SourceError::SchemaMismatch {
                message: format!("invalid ndjson at line {}: {}", i + 1, e),
            }
        })?;
        values.push(v);
    }
    Ok(values)
}

/// Write `table` as JSON records.
///
/// Write options: `orient` (only `records`), `indent` (pretty-print width, document layout
/// only), `lines`, `index` (accepted and ignored).
pub fn write_json<W: Write>(
    mut writer: W,
    table: &DataSet,
    lines: bool,
    options: &Options,
) -> SourceResult<()> {
    let mut lines = lines;
    let mut indent: Option<usize> = None;
    for key in options.keys() {
        match key.as_str() {
            "orient" => check_orient(options, key)?,
            "indent" => indent = opt_u64(options, BACKEND, key)?.map(|n| n as usize),
            "lines" => lines = opt_bool(options, BACKEND, key)?.unwrap_or(lines),
            "index" => {
                opt_bool(options, BACKEND, key)?;
            }
            other => return Err(unsupported_option(other)),
        }
    }

    let records = table_to_records(table);
    if lines {
        for record in &records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        return Ok(());
    }

    match indent {
        Some(width) => {
            let pad = vec![b' '; width];
            let formatter = serde_json::ser::PrettyFormatter::with_indent(&pad);
            let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
            records.serialize(&mut ser)?;
        }
        None => serde_json::to_writer(&mut writer, &records)?,
    }
    writer.write_all(b"\n")?;
    Ok(())
}

/// One JSON object per row, keyed by column name in schema order.
pub fn table_to_records(table: &DataSet) -> Vec<serde_json::Map<String, serde_json::Value>> {
    table
        .rows
        .iter()
        .map(|row| {
            table
                .schema
                .field_names()
                .zip(row.iter())
                .map(|(name, v)| (name.to_string(), value_to_json(v)))
                .collect()
        })
        .collect()
}

/// JSON form of a value. Non-finite floats have no JSON form and become `null`.
pub fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Int64(i) => serde_json::Value::from(*i),
        Value::Float64(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Utf8(s) => serde_json::Value::String(s.clone()),
    }
}

fn check_orient(options: &Options, key: &str) -> SourceResult<()> {
    match opt_str(options, BACKEND, key)? {
        None | Some("records") => Ok(()),
        Some(other) => Err(SourceError::InvalidOption {
            backend: BACKEND,
            option: key.to_string(),
            message: format!("only 'records' orientation is supported, got '{other}'"),
        }),
    }
}

fn unsupported_option(name: &str) -> SourceError {
    SourceError::InvalidOption {
        backend: BACKEND,
        option: name.to_string(),
        message: "not a recognized json option".to_string(),
    }
}

fn ingest_json_values(values: &[serde_json::Value], schema: &Schema) -> SourceResult<DataSet> {
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(values.len());

    for (idx0, v) in values.iter().enumerate() {
        let row_num = idx0 + 1;
        let obj = v.as_object().ok_or_else(|| SourceError::SchemaMismatch {
            message: format!("row {row_num} is not a json object"),
        })?;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let jv = get_by_dot_path(obj, &field.name).ok_or_else(|| SourceError::SchemaMismatch {
                message: format!("row {row_num} missing required field '{}'", field.name),
            })?;
            row.push(convert_json_value(row_num, &field.name, &field.data_type, jv)?);
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema.clone(), rows))
}

fn get_by_dot_path<'a>(
    root: &'a serde_json::Map<String, serde_json::Value>,
    path: &str,
) -> Option<&'a serde_json::Value> {
    // Flat keys that happen to contain dots win over nested lookup.
    if let Some(v) = root.get(path) {
        return Some(v);
    }

    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        match current {
            serde_json::Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

fn convert_json_value(
    row: usize,
    column: &str,
    data_type: &DataType,
    v: &serde_json::Value,
) -> SourceResult<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }

    let mismatch = |message: &str| SourceError::ParseError {
        row,
        column: column.to_string(),
        raw: v.to_string(),
        message: message.to_string(),
    };

    match data_type {
        DataType::Utf8 => v
            .as_str()
            .map(|s| Value::Utf8(s.to_string()))
            .ok_or_else(|| mismatch("expected string")),
        DataType::Bool => v.as_bool().map(Value::Bool).ok_or_else(|| mismatch("expected bool")),
        DataType::Int64 => {
            if let Some(n) = v.as_i64() {
                Ok(Value::Int64(n))
            } else if v.as_u64().is_some() {
                Err(mismatch("u64 out of range for i64"))
            } else {
                Err(mismatch("expected integer number"))
            }
        }
        DataType::Float64 => v.as_f64().map(Value::Float64).ok_or_else(|| mismatch("expected number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{sample_table, Field};

    fn people_schema_nested() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("user.name", DataType::Utf8),
            Field::new("score", DataType::Float64),
        ])
    }

    #[test]
    fn records_document_round_trips_sample_table() {
        let mut buf = Vec::new();
        write_json(&mut buf, &sample_table(), false, &Options::new()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains(r#"{"id":2,"name":"Bob","score":92.0}"#));

        let back = read_json_str(&text, false, &Options::new(), None).unwrap();
        assert_eq!(back, sample_table());
    }

    #[test]
    fn ndjson_round_trips_sample_table() {
        let mut buf = Vec::new();
        write_json(&mut buf, &sample_table(), true, &Options::new()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 3);

        let back = read_json_str(&text, true, &Options::new(), None).unwrap();
        assert_eq!(back, sample_table());
    }

    #[test]
    fn document_mode_falls_back_to_ndjson() {
        let input = "{\"a\":1}\n{\"a\":2}\n";
        let ds = read_json_str(input, false, &Options::new(), None).unwrap();
        assert_eq!(ds.rows, vec![vec![Value::Int64(1)], vec![Value::Int64(2)]]);
    }

    #[test]
    fn indented_output_is_pretty_printed() {
        let opts: Options = serde_json::from_str(r#"{"orient": "records", "indent": 2}"#).unwrap();
        let mut buf = Vec::new();
        write_json(&mut buf, &sample_table(), false, &opts).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\n  {\n    \"id\": 1,"));
    }

    #[test]
    fn non_records_orient_is_rejected() {
        let opts: Options = serde_json::from_str(r#"{"orient": "split"}"#).unwrap();
        let err = write_json(Vec::new(), &sample_table(), false, &opts).unwrap_err();
        assert!(err.to_string().contains("only 'records' orientation"));
    }

    #[test]
    fn schema_directed_read_follows_dot_paths() {
        let input = r#"[{"id":1,"user":{"name":"Ada"},"score":98.5}]"#;
        let ds = read_json_str(input, false, &Options::new(), Some(&people_schema_nested())).unwrap();
        assert_eq!(ds.rows[0][1], Value::Utf8("Ada".to_string()));
    }

    #[test]
    fn schema_directed_read_reports_missing_field_and_type_mismatch() {
        let schema = people_schema_nested();
        let err = read_json_str(r#"[{"id":1,"user":{"name":"Ada"}}]"#, false, &Options::new(), Some(&schema))
            .unwrap_err();
        assert!(err.to_string().contains("missing required field 'score'"));

        let err = read_json_str(
            r#"[{"id":"nope","user":{"name":"Ada"},"score":1.0}]"#,
            false,
            &Options::new(),
            Some(&schema),
        )
        .unwrap_err();
        assert!(err.to_string().contains("column 'id'"));
    }

    #[test]
    fn scalar_document_is_a_schema_mismatch() {
        let err = read_json_str("42", false, &Options::new(), None).unwrap_err();
        assert!(err.to_string().contains("schema mismatch"));
    }
}
