//! Delimited-text driver.
//!
//! Without a configured schema, column types are inferred (see [`crate::infer`]). With one,
//! the header must contain every schema field (order can differ) and each cell is parsed
//! according to the field type.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::config::{opt_bool, opt_byte, opt_str, Options, SourceConfig};
use crate::error::{SourceError, SourceResult};
use crate::infer;
use crate::types::{DataSet, DataType, Schema, Value};

use super::{ensure_parent_dir, SourceDriver, SourceKind};

const BACKEND: &str = "csv";

/// Reads and writes `.csv` files.
#[derive(Debug, Clone, Default)]
pub struct CsvDriver {
    config: SourceConfig,
}

impl CsvDriver {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }
}

impl SourceDriver for CsvDriver {
    fn kind(&self) -> SourceKind {
        SourceKind::Csv
    }

    fn read(&self, location: &str) -> SourceResult<DataSet> {
        let file = File::open(location)?;
        read_csv(file, &self.config.options, self.config.schema.as_ref())
    }

    fn write(&self, table: &DataSet, location: &str) -> SourceResult<()> {
        let path = Path::new(location);
        ensure_parent_dir(path)?;
        let file = File::create(path)?;
        write_csv(file, table, &self.config.write_options)
    }
}

/// Read CSV from any reader using read `options`.
///
/// Supported options: `delimiter` (alias `sep`), `has_headers` (alias `header`), `quote`,
/// `comment`, `flexible`, `trim`, `encoding` (utf-8 only).
pub fn read_csv<R: Read>(reader: R, options: &Options, schema: Option<&Schema>) -> SourceResult<DataSet> {
    let mut builder = ::csv::ReaderBuilder::new();
    builder.has_headers(true);
    for key in options.keys() {
        match key.as_str() {
            "delimiter" | "sep" => {
                if let Some(b) = opt_byte(options, BACKEND, key)? {
                    builder.delimiter(b);
                }
            }
            "has_headers" | "header" => {
                builder.has_headers(opt_bool(options, BACKEND, key)?.unwrap_or(true));
            }
            "quote" => {
                if let Some(b) = opt_byte(options, BACKEND, key)? {
                    builder.quote(b);
                }
            }
            "comment" => {
                builder.comment(opt_byte(options, BACKEND, key)?);
            }
            "flexible" => {
                builder.flexible(opt_bool(options, BACKEND, key)?.unwrap_or(false));
            }
            "trim" => {
                if opt_bool(options, BACKEND, key)?.unwrap_or(false) {
                    builder.trim(::csv::Trim::All);
                }
            }
            "encoding" => check_encoding(options, key)?,
            other => return Err(unsupported_option(other)),
        }
    }

    let mut rdr = builder.from_reader(reader);
    match schema {
        Some(schema) => read_csv_with_schema(&mut rdr, schema),
        None => read_csv_inferred(&mut rdr),
    }
}

fn read_csv_inferred<R: Read>(rdr: &mut ::csv::Reader<R>) -> SourceResult<DataSet> {
    let headers: Option<Vec<String>> = if rdr.has_headers() {
        Some(rdr.headers()?.iter().map(str::to_string).collect())
    } else {
        None
    };

    let mut records: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        records.push(record.iter().map(str::to_string).collect());
    }

    // Without a header row, columns are named by position.
    let headers = headers.unwrap_or_else(|| {
        let width = records.iter().map(Vec::len).max().unwrap_or(0);
        (0..width).map(|i| i.to_string()).collect()
    });
    Ok(infer::infer_from_text(headers, records))
}

/// Read CSV rows, parsing each value according to `schema`.
///
/// With a header row, schema fields are matched by name; otherwise by position.
pub fn read_csv_with_schema<R: Read>(
    rdr: &mut ::csv::Reader<R>,
    schema: &Schema,
) -> SourceResult<DataSet> {
    let col_idxs: Vec<usize> = if rdr.has_headers() {
        let headers = rdr.headers()?.clone();
        let mut idxs = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            match headers.iter().position(|h| h == field.name) {
                Some(idx) => idxs.push(idx),
                None => {
                    return Err(SourceError::SchemaMismatch {
                        message: format!(
                            "missing required column '{field}'. headers={:?}",
                            headers.iter().collect::<Vec<_>>(),
                            field = field.name
                        ),
                    });
                }
            }
        }
        idxs
    } else {
        (0..schema.fields.len()).collect()
    };

    let header_rows = usize::from(rdr.has_headers());
    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        // 1-based row number as seen in the file.
        let user_row = row_idx0 + 1 + header_rows;
        let record = result?;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &csv_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let raw = record.get(csv_idx).unwrap_or("");
            row.push(parse_typed_value(user_row, &field.name, &field.data_type, raw)?);
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema.clone(), rows))
}

/// Write `table` as CSV using write `options`.
///
/// Supported options: `delimiter` (alias `sep`), `header`, `quote`, `index` (tables carry no
/// index, so it is accepted and ignored).
pub fn write_csv<W: Write>(writer: W, table: &DataSet, options: &Options) -> SourceResult<()> {
    let mut builder = ::csv::WriterBuilder::new();
    let mut header = true;
    for key in options.keys() {
        match key.as_str() {
            "delimiter" | "sep" => {
                if let Some(b) = opt_byte(options, BACKEND, key)? {
                    builder.delimiter(b);
                }
            }
            "header" | "has_headers" => header = opt_bool(options, BACKEND, key)?.unwrap_or(true),
            "quote" => {
                if let Some(b) = opt_byte(options, BACKEND, key)? {
                    builder.quote(b);
                }
            }
            "index" => {
                opt_bool(options, BACKEND, key)?;
            }
            other => return Err(unsupported_option(other)),
        }
    }

    let mut wtr = builder.from_writer(writer);
    if header {
        wtr.write_record(table.schema.field_names())?;
    }
    for row in &table.rows {
        wtr.write_record(row.iter().map(cell_text))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Text form of a cell. Floats always carry a `.` or exponent so they read back as floats.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Int64(v) => v.to_string(),
        Value::Float64(v) => format!("{v:?}"),
        Value::Bool(v) => v.to_string(),
        Value::Utf8(s) => s.clone(),
    }
}

fn check_encoding(options: &Options, key: &str) -> SourceResult<()> {
    match opt_str(options, BACKEND, key)? {
        None => Ok(()),
        Some(enc) if enc.eq_ignore_ascii_case("utf-8") || enc.eq_ignore_ascii_case("utf8") => Ok(()),
        Some(enc) => Err(SourceError::InvalidOption {
            backend: BACKEND,
            option: key.to_string(),
            message: format!("unsupported encoding '{enc}'"),
        }),
    }
}

fn unsupported_option(name: &str) -> SourceError {
    SourceError::InvalidOption {
        backend: BACKEND,
        option: name.to_string(),
        message: "not a recognized csv option".to_string(),
    }
}

fn parse_typed_value(
    row: usize,
    column: &str,
    data_type: &DataType,
    raw: &str,
) -> SourceResult<Value> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    if *data_type == DataType::Utf8 {
        return Ok(Value::Utf8(raw.to_owned()));
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Utf8 => Ok(Value::Utf8(raw.to_owned())),
        DataType::Int64 => trimmed.parse::<i64>().map(Value::Int64).map_err(|e| {
            SourceError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }
        }),
        DataType::Float64 => trimmed.parse::<f64>().map(Value::Float64).map_err(|e| {
            SourceError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }
        }),
        DataType::Bool => parse_bool(trimmed).map(Value::Bool).map_err(|message| {
            SourceError::ParseError {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message,
            }
        }),
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{sample_table, Field};

    fn options(json: &str) -> Options {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn sample_table_round_trips_through_text() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &sample_table(), &Options::new()).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("id,name,score\n1,Alice,85.5\n2,Bob,92.0\n"));

        let back = read_csv(buf.as_slice(), &Options::new(), None).unwrap();
        assert_eq!(back, sample_table());
    }

    #[test]
    fn headerless_input_gets_positional_names() {
        let ds = read_csv("1;x\n2;y\n".as_bytes(), &options(r#"{"header": false, "sep": ";"}"#), None)
            .unwrap();
        let names: Vec<&str> = ds.schema.field_names().collect();
        assert_eq!(names, vec!["0", "1"]);
        assert_eq!(ds.rows[1], vec![Value::Int64(2), Value::Utf8("y".into())]);
    }

    #[test]
    fn schema_directed_read_allows_reordered_columns() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("active", DataType::Bool),
        ]);
        let ds = read_csv("active,id\nyes,7\n".as_bytes(), &Options::new(), Some(&schema)).unwrap();
        assert_eq!(ds.rows, vec![vec![Value::Int64(7), Value::Bool(true)]]);
    }

    #[test]
    fn schema_directed_read_reports_parse_errors() {
        let schema = Schema::new(vec![Field::new("id", DataType::Int64)]);
        let err = read_csv("id\nnot_an_int\n".as_bytes(), &Options::new(), Some(&schema)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed to parse value at row 2"));
        assert!(msg.contains("column 'id'"));
    }

    #[test]
    fn schema_directed_read_reports_missing_column() {
        let schema = Schema::new(vec![Field::new("active", DataType::Bool)]);
        let err = read_csv("id\n1\n".as_bytes(), &Options::new(), Some(&schema)).unwrap_err();
        assert!(err.to_string().contains("missing required column 'active'"));
    }

    #[test]
    fn unknown_options_surface_as_backend_errors() {
        let err = read_csv("a\n1\n".as_bytes(), &options(r#"{"engine": "c"}"#), None).unwrap_err();
        assert!(err.to_string().contains("invalid csv option 'engine'"));

        let err = read_csv("a\n1\n".as_bytes(), &options(r#"{"encoding": "latin-1"}"#), None).unwrap_err();
        assert!(err.to_string().contains("unsupported encoding"));
    }

    #[test]
    fn padded_text_survives_a_round_trip() {
        let ds = DataSet::new(
            Schema::new(vec![Field::new("id", DataType::Int64), Field::new("name", DataType::Utf8)]),
            vec![
                vec![Value::Int64(1), Value::Utf8(" Alice ".into())],
                vec![Value::Int64(2), Value::Utf8("  ".into())],
            ],
        );
        let mut buf = Vec::new();
        write_csv(&mut buf, &ds, &Options::new()).unwrap();
        assert_eq!(read_csv(buf.as_slice(), &Options::new(), None).unwrap(), ds);
        assert_eq!(read_csv(buf.as_slice(), &Options::new(), Some(&ds.schema)).unwrap(), ds);

        // Numbers are still typed through their padding.
        let padded = read_csv("n\n 7 \n".as_bytes(), &Options::new(), None).unwrap();
        assert_eq!(padded.rows, vec![vec![Value::Int64(7)]]);
    }

    #[test]
    fn nulls_are_written_as_empty_cells() {
        let ds = DataSet::new(
            Schema::new(vec![Field::new("a", DataType::Int64), Field::new("b", DataType::Utf8)]),
            vec![vec![Value::Null, Value::Utf8("x".into())], vec![Value::Int64(2), Value::Null]],
        );
        let mut buf = Vec::new();
        write_csv(&mut buf, &ds, &options(r#"{"header": true, "index": false}"#)).unwrap();
        assert_eq!(String::from_utf8(buf.clone()).unwrap(), "a,b\n,x\n2,\n");
        assert_eq!(read_csv(buf.as_slice(), &Options::new(), None).unwrap(), ds);
    }
}
