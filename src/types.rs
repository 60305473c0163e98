//! Core data model types.
//!
//! Every driver reads into and writes from an in-memory [`DataSet`]: an ordered list of typed
//! [`Field`]s (the [`Schema`]) plus row-major [`Value`] storage. The schema is not fixed
//! system-wide; drivers infer it from the source data unless one is configured.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

impl DataType {
    /// `true` for [`DataType::Int64`] and [`DataType::Float64`].
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// A list of fields describing the shape of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A single typed value in a [`DataSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int64(v) => Some(*v as f64),
            Self::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Utf8(v) => f.write_str(v),
        }
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the dataset.
    pub fn column_count(&self) -> usize {
        self.schema.fields.len()
    }

    /// Values of one column in row order, or `None` if the column does not exist.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.schema.index_of(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).unwrap_or(&Value::Null))
                .collect(),
        )
    }

    /// Create a new dataset containing the rows at `indices`, in the given order.
    ///
    /// Out-of-range indices are skipped.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let rows = indices
            .iter()
            .filter_map(|&i| self.rows.get(i).cloned())
            .collect();
        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// The first `n` rows (or all rows if there are fewer).
    pub fn head(&self, n: usize) -> Self {
        Self {
            schema: self.schema.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Reduce (fold) all rows into an accumulator value.
    ///
    /// This is similar to `Iterator::fold`, but provides each row as `&[Value]`.
    pub fn reduce_rows<A, F>(&self, init: A, mut reducer: F) -> A
    where
        F: FnMut(A, &[Value]) -> A,
    {
        self.rows
            .iter()
            .fold(init, |acc, row| reducer(acc, row.as_slice()))
    }
}

/// Plain-text grid: a header line, then one line per row, cells padded to column width.
impl fmt::Display for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(Value::to_string).collect())
            .collect();
        let widths: Vec<usize> = self
            .schema
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                cells
                    .iter()
                    .filter_map(|row| row.get(i).map(String::len))
                    .fold(field.name.len(), usize::max)
            })
            .collect();

        let header: Vec<String> = self
            .schema
            .fields
            .iter()
            .zip(&widths)
            .map(|(field, w)| format!("{:<w$}", field.name, w = *w))
            .collect();
        writeln!(f, "{}", header.join("  ").trim_end())?;
        for row in &cells {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
                .collect();
            writeln!(f, "{}", line.join("  ").trim_end())?;
        }
        Ok(())
    }
}

/// The fixed demonstration table used to smoke-test drivers:
/// `{id: [1, 2, 3], name: [Alice, Bob, Charlie], score: [85.5, 92.0, 78.3]}`.
pub fn sample_table() -> DataSet {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int64),
        Field::new("name", DataType::Utf8),
        Field::new("score", DataType::Float64),
    ]);
    let rows = [(1, "Alice", 85.5), (2, "Bob", 92.0), (3, "Charlie", 78.3)]
        .into_iter()
        .map(|(id, name, score)| {
            vec![
                Value::Int64(id),
                Value::Utf8(name.to_string()),
                Value::Float64(score),
            ]
        })
        .collect();
    DataSet::new(schema, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_index_of_works() {
        let ds = sample_table();
        assert_eq!(ds.schema.index_of("id"), Some(0));
        assert_eq!(ds.schema.index_of("score"), Some(2));
        assert_eq!(ds.schema.index_of("missing"), None);
    }

    #[test]
    fn select_rows_keeps_schema_and_order() {
        let ds = sample_table();
        let out = ds.select_rows(&[2, 0, 9]);
        assert_eq!(out.schema, ds.schema);
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.rows[0][1], Value::Utf8("Charlie".to_string()));
        assert_eq!(out.rows[1][1], Value::Utf8("Alice".to_string()));
    }

    #[test]
    fn column_values_returns_none_for_missing_column() {
        let ds = sample_table();
        assert!(ds.column_values("nope").is_none());
        let ids = ds.column_values("id").unwrap();
        assert_eq!(ids, vec![&Value::Int64(1), &Value::Int64(2), &Value::Int64(3)]);
    }

    #[test]
    fn display_renders_a_padded_grid() {
        let text = sample_table().head(2).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["id  name   score", "1   Alice  85.5", "2   Bob    92.0"]);
    }

    #[test]
    fn head_truncates() {
        let ds = sample_table();
        assert_eq!(ds.head(2).row_count(), 2);
        assert_eq!(ds.head(10).row_count(), 3);
    }
}
