//! Column reductions for [`crate::types::DataSet`].

use std::collections::HashSet;

use crate::types::{DataSet, DataType, Value};

/// Built-in reduction operations over a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Count all rows (including nulls).
    Count,
    /// Count non-null values.
    NonNullCount,
    /// Count null values.
    NullCount,
    /// Count distinct non-null values.
    DistinctCount,
    /// Sum numeric values, ignoring nulls.
    Sum,
    /// Minimum numeric value, ignoring nulls.
    Min,
    /// Maximum numeric value, ignoring nulls.
    Max,
    /// Arithmetic mean of numeric values, ignoring nulls.
    Mean,
    /// Sample standard deviation (n - 1) of numeric values, ignoring nulls.
    Std,
}

/// Reduce a column using a built-in [`ReduceOp`].
///
/// - Returns `None` if `column` does not exist in the schema.
/// - Counts always return `Some(Value::Int64(..))`.
/// - `Sum`/`Min`/`Max` keep the column type; `Mean`/`Std` return `Float64`.
/// - Numeric ops return `Some(Value::Null)` on non-numeric columns or when there are too few
///   non-null values (none, or one for `Std`).
pub fn reduce(dataset: &DataSet, column: &str, op: ReduceOp) -> Option<Value> {
    let idx = dataset.schema.index_of(column)?;
    let data_type = dataset.schema.fields.get(idx)?.data_type;
    let cells = dataset.rows.iter().map(move |row| row.get(idx).unwrap_or(&Value::Null));

    let out = match op {
        ReduceOp::Count => Value::Int64(dataset.row_count() as i64),
        ReduceOp::NonNullCount => Value::Int64(cells.filter(|v| !v.is_null()).count() as i64),
        ReduceOp::NullCount => Value::Int64(cells.filter(|v| v.is_null()).count() as i64),
        ReduceOp::DistinctCount => {
            let distinct: HashSet<String> = cells.filter(|v| !v.is_null()).map(value_key).collect();
            Value::Int64(distinct.len() as i64)
        }
        ReduceOp::Sum | ReduceOp::Min | ReduceOp::Max => match data_type {
            DataType::Int64 => fold_typed(cells.filter_map(|v| match v {
                Value::Int64(x) => Some(*x),
                _ => None,
            }), op)
            .map(Value::Int64)
            .unwrap_or(Value::Null),
            DataType::Float64 => fold_typed(cells.filter_map(|v| match v {
                Value::Float64(x) => Some(*x),
                _ => None,
            }), op)
            .map(Value::Float64)
            .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        ReduceOp::Mean | ReduceOp::Std => {
            if !data_type.is_numeric() {
                return Some(Value::Null);
            }
            let values: Vec<f64> = cells.filter_map(Value::as_f64).collect();
            let stat = if op == ReduceOp::Mean {
                mean(&values)
            } else {
                sample_std(&values)
            };
            stat.map(Value::Float64).unwrap_or(Value::Null)
        }
    };
    Some(out)
}

trait Numeric: Copy + PartialOrd + std::ops::Add<Output = Self> {}
impl Numeric for i64 {}
impl Numeric for f64 {}

fn fold_typed<T: Numeric>(values: impl Iterator<Item = T>, op: ReduceOp) -> Option<T> {
    values.fold(None, |acc, v| {
        Some(match acc {
            None => v,
            Some(a) => match op {
                ReduceOp::Min if v < a => v,
                ReduceOp::Max if v > a => v,
                ReduceOp::Sum => a + v,
                _ => a,
            },
        })
    })
}

/// Numeric view of a column's non-null values, in row order.
///
/// Returns `None` if the column does not exist or is not numeric.
pub fn numeric_values(dataset: &DataSet, column: &str) -> Option<Vec<f64>> {
    let idx = dataset.schema.index_of(column)?;
    if !dataset.schema.fields[idx].data_type.is_numeric() {
        return None;
    }
    Some(
        dataset
            .rows
            .iter()
            .filter_map(|row| row.get(idx).and_then(Value::as_f64))
            .collect(),
    )
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Text key used for distinct/frequency counting.
pub(crate) fn value_key(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Int64(x) => x.to_string(),
        Value::Float64(x) => format!("{x:?}"),
        Value::Bool(b) => b.to_string(),
        Value::Utf8(s) => s.clone(),
    }
}
