//! Exploratory summary of a loaded table.
//!
//! [`summarize`] is a read-only consumer: it never touches the ingestion artifacts. Its output
//! can be persisted with [`write_summary_artifacts`] into a separate directory.

pub mod stats;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::{HISTOGRAM_BINS, PREVIEW_ROWS};
use crate::datasource::DataSource;
use crate::error::Result;
use crate::processing::reduce::value_key;
use crate::processing::{mean, reduce, sample_std, ReduceOp};
use crate::types::{DataSet, DataType, Field, Schema, Value};

pub use stats::{quantile_sorted, Correlation, Histogram};

/// Row/column counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub rows: usize,
    pub columns: usize,
}

impl Shape {
    pub fn to_table(self) -> DataSet {
        let schema = Schema::new(vec![
            Field::new("rows", DataType::Int64),
            Field::new("columns", DataType::Int64),
        ]);
        DataSet::new(
            schema,
            vec![vec![Value::Int64(self.rows as i64), Value::Int64(self.columns as i64)]],
        )
    }
}

/// Everything [`summarize`] derives from a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// First [`PREVIEW_ROWS`] rows.
    pub preview: DataSet,
    pub shape: Shape,
    /// One `statistic` label column plus one column per input column.
    pub describe: DataSet,
    /// One per numeric column that has at least one value.
    pub histograms: Vec<Histogram>,
    /// Present when the table has more than one numeric column.
    pub correlation: Option<Correlation>,
}

const NUMERIC_STATS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];
const CATEGORICAL_STATS: [&str; 4] = ["count", "unique", "top", "freq"];

/// Summarize `table`.
pub fn summarize(table: &DataSet) -> Summary {
    let numeric: Vec<String> = table
        .schema
        .fields
        .iter()
        .filter(|f| f.data_type.is_numeric())
        .map(|f| f.name.clone())
        .collect();

    let histograms = numeric
        .iter()
        .filter_map(|name| {
            let values = crate::processing::numeric_values(table, name)?;
            Histogram::compute(name.clone(), &values, HISTOGRAM_BINS)
        })
        .collect();

    let correlation = (numeric.len() > 1).then(|| Correlation::compute(table, &numeric));

    Summary {
        preview: table.head(PREVIEW_ROWS),
        shape: Shape {
            rows: table.row_count(),
            columns: table.column_count(),
        },
        describe: describe(table),
        histograms,
        correlation,
    }
}

/// Descriptive statistics, one column per input column.
///
/// Numeric columns get `count, mean, std, min, 25%, 50%, 75%, max`; other columns get
/// `count, unique, top, freq`. A mixed table carries the union of both row sets (numeric rows
/// first after `count`), with nulls where a statistic does not apply. A trailing `nulls` row is
/// always present.
pub fn describe(table: &DataSet) -> DataSet {
    let has_numeric = table.schema.fields.iter().any(|f| f.data_type.is_numeric());
    let has_other = table.schema.fields.iter().any(|f| !f.data_type.is_numeric());

    let mut labels: Vec<&str> = vec!["count"];
    if has_other || !has_numeric {
        labels.extend(&CATEGORICAL_STATS[1..]);
    }
    if has_numeric {
        labels.extend(&NUMERIC_STATS[1..]);
    }
    labels.push("nulls");

    let mut fields = vec![Field::new("statistic", DataType::Utf8)];
    let mut columns: Vec<Vec<Value>> = Vec::with_capacity(table.column_count());
    for field in &table.schema.fields {
        let stats = if field.data_type.is_numeric() {
            fields.push(Field::new(field.name.clone(), DataType::Float64));
            numeric_stats(table, &field.name)
        } else {
            fields.push(Field::new(field.name.clone(), DataType::Utf8));
            categorical_stats(table, &field.name)
        };
        columns.push(
            labels
                .iter()
                .map(|label| {
                    stats
                        .iter()
                        .find(|(l, _)| l == label)
                        .map(|(_, v)| v.clone())
                        .unwrap_or(Value::Null)
                })
                .collect(),
        );
    }

    let rows = labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let mut row = vec![Value::Utf8(label.to_string())];
            row.extend(columns.iter().map(|col| col[i].clone()));
            row
        })
        .collect();
    DataSet::new(Schema::new(fields), rows)
}

fn count_of(table: &DataSet, column: &str, op: ReduceOp) -> i64 {
    match reduce(table, column, op) {
        Some(Value::Int64(n)) => n,
        _ => 0,
    }
}

fn numeric_stats(table: &DataSet, column: &str) -> Vec<(&'static str, Value)> {
    let mut values = crate::processing::numeric_values(table, column).unwrap_or_default();
    values.sort_by(f64::total_cmp);
    let float = |v: Option<f64>| v.map(Value::Float64).unwrap_or(Value::Null);

    vec![
        ("count", Value::Float64(values.len() as f64)),
        ("mean", float(mean(&values))),
        ("std", float(sample_std(&values))),
        ("min", float(values.first().copied())),
        ("25%", float(quantile_sorted(&values, 0.25))),
        ("50%", float(quantile_sorted(&values, 0.5))),
        ("75%", float(quantile_sorted(&values, 0.75))),
        ("max", float(values.last().copied())),
        ("nulls", Value::Float64(count_of(table, column, ReduceOp::NullCount) as f64)),
    ]
}

fn categorical_stats(table: &DataSet, column: &str) -> Vec<(&'static str, Value)> {
    let text = |n: i64| Value::Utf8(n.to_string());
    let mut out = vec![
        ("count", text(count_of(table, column, ReduceOp::NonNullCount))),
        ("unique", text(count_of(table, column, ReduceOp::DistinctCount))),
    ];

    // Most frequent value; ties go to the value seen first.
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, i64)> = Vec::new();
    for v in table.column_values(column).unwrap_or_default() {
        if v.is_null() {
            continue;
        }
        let key = value_key(v);
        match slots.get(&key) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }
    let top = counts
        .into_iter()
        .fold(None::<(String, i64)>, |best, (k, n)| match best {
            Some((_, bn)) if bn >= n => best,
            _ => Some((k, n)),
        });
    if let Some((value, freq)) = top {
        out.push(("top", Value::Utf8(value)));
        out.push(("freq", text(freq)));
    }

    out.push(("nulls", text(count_of(table, column, ReduceOp::NullCount))));
    out
}

/// Keep letters, digits, `_` and `-`; everything else becomes `_`.
fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() { "column".to_string() } else { stem }
}

/// One distinct file stem per histogram. A stem already taken (compared case-insensitively)
/// gets the histogram's position appended.
fn histogram_stems(histograms: &[Histogram]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    histograms
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let base = sanitize_file_stem(&h.column);
            let mut stem = base.clone();
            let mut n = i;
            while !used.insert(stem.to_ascii_lowercase()) {
                stem = format!("{base}_{n}");
                n += 1;
            }
            stem
        })
        .collect()
}

/// Persist a summary as CSV files under `dir` through `source`.
///
/// Writes `preview.csv`, `shape.csv`, `describe.csv`, one `hist_<column>.csv` per histogram and
/// `correlation.csv` when a correlation matrix exists. Returns the written paths.
pub fn write_summary_artifacts(
    summary: &Summary,
    dir: impl AsRef<Path>,
    source: &DataSource,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut outputs: Vec<(PathBuf, DataSet)> = vec![
        (dir.join("preview.csv"), summary.preview.clone()),
        (dir.join("shape.csv"), summary.shape.to_table()),
        (dir.join("describe.csv"), summary.describe.clone()),
    ];
    for (h, stem) in summary.histograms.iter().zip(histogram_stems(&summary.histograms)) {
        outputs.push((dir.join(format!("hist_{stem}.csv")), h.to_table()));
    }
    if let Some(corr) = &summary.correlation {
        outputs.push((dir.join("correlation.csv"), corr.to_table()));
    }

    let mut written = Vec::with_capacity(outputs.len());
    for (path, table) in outputs {
        source.write_table(&table, &path.to_string_lossy())?;
        written.push(path);
    }
    tracing::info!(dir = %dir.display(), files = written.len(), "summary artifacts written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::sample_table;

    fn cell<'a>(table: &'a DataSet, stat: &str, column: &str) -> &'a Value {
        let row = table
            .rows
            .iter()
            .find(|r| r[0] == Value::Utf8(stat.to_string()))
            .unwrap();
        &row[table.schema.index_of(column).unwrap()]
    }

    #[test]
    fn describe_mixed_table() {
        let d = describe(&sample_table());
        let labels: Vec<String> = d
            .rows
            .iter()
            .map(|r| match &r[0] {
                Value::Utf8(s) => s.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(
            labels,
            vec!["count", "unique", "top", "freq", "mean", "std", "min", "25%", "50%", "75%", "max", "nulls"]
        );
        assert_eq!(cell(&d, "count", "id"), &Value::Float64(3.0));
        assert_eq!(cell(&d, "mean", "id"), &Value::Float64(2.0));
        assert_eq!(cell(&d, "50%", "score"), &Value::Float64(85.5));
        assert_eq!(cell(&d, "max", "score"), &Value::Float64(92.0));
        assert_eq!(cell(&d, "unique", "name"), &Value::Utf8("3".into()));
        assert_eq!(cell(&d, "top", "name"), &Value::Utf8("Alice".into()));
        assert_eq!(cell(&d, "mean", "name"), &Value::Null);
        assert_eq!(cell(&d, "top", "id"), &Value::Null);
        assert_eq!(cell(&d, "nulls", "score"), &Value::Float64(0.0));
    }

    #[test]
    fn summary_has_histograms_and_correlation_for_numeric_columns() {
        let s = summarize(&sample_table());
        assert_eq!(s.shape, Shape { rows: 3, columns: 3 });
        assert_eq!(s.preview.row_count(), 3);
        let hist_cols: Vec<&str> = s.histograms.iter().map(|h| h.column.as_str()).collect();
        assert_eq!(hist_cols, vec!["id", "score"]);
        assert!(s.histograms.iter().all(|h| h.counts.iter().sum::<u64>() == 3));
        assert!(s.correlation.is_some());
    }

    #[test]
    fn single_numeric_column_has_no_correlation() {
        let table = sample_table();
        let only_score = DataSet::new(
            Schema::new(vec![table.schema.fields[2].clone()]),
            table.rows.iter().map(|r| vec![r[2].clone()]).collect(),
        );
        assert!(summarize(&only_score).correlation.is_none());
    }

    #[test]
    fn colliding_column_names_get_distinct_histogram_files() {
        let names = ["a b", "a_b", "A_B", "c"];
        let histograms: Vec<Histogram> = names
            .iter()
            .filter_map(|n| Histogram::compute(*n, &[1.0, 2.0], 2))
            .collect();
        assert_eq!(histogram_stems(&histograms), vec!["a_b", "a_b_1", "A_B_2", "c"]);

        let dir = tempfile::tempdir().unwrap();
        let summary = Summary {
            histograms,
            ..summarize(&sample_table())
        };
        let written = write_summary_artifacts(&summary, dir.path(), &DataSource::new()).unwrap();
        let hist_files = written
            .iter()
            .filter(|p| p.file_name().is_some_and(|n| n.to_string_lossy().starts_with("hist_")))
            .count();
        assert_eq!(hist_files, 4);
    }

    #[test]
    fn top_value_ties_go_to_the_first_seen() {
        let table = DataSet::new(
            Schema::new(vec![Field::new("c", DataType::Utf8)]),
            ["y", "x", "x", "y", "z"]
                .iter()
                .map(|s| vec![Value::Utf8(s.to_string())])
                .collect(),
        );
        let d = describe(&table);
        assert_eq!(cell(&d, "top", "c"), &Value::Utf8("y".into()));
        assert_eq!(cell(&d, "freq", "c"), &Value::Utf8("2".into()));
    }

    #[test]
    fn file_stems_are_sanitized() {
        assert_eq!(sanitize_file_stem("user.age (yrs)"), "user_age__yrs_");
        assert_eq!(sanitize_file_stem(""), "column");
    }
}
