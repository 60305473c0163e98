//! Distribution and correlation statistics over numeric columns.

use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Linear-interpolated quantile of already sorted values (`q` in `[0, 1]`).
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Equal-width histogram of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub column: String,
    /// `bins + 1` ascending bin edges.
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Histogram of `values` over `bins` equal-width bins spanning `[min, max]`.
    ///
    /// The last bin is closed on the right. When all values are equal the range is widened to
    /// `[v - 0.5, v + 0.5]`. Returns `None` for no values or zero bins.
    pub fn compute(column: impl Into<String>, values: &[f64], bins: usize) -> Option<Self> {
        if values.is_empty() || bins == 0 {
            return None;
        }
        let (mut lo, mut hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins)
            .map(|i| if i == bins { hi } else { lo + width * i as f64 })
            .collect();

        let mut counts = vec![0u64; bins];
        for &v in values {
            let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Some(Self {
            column: column.into(),
            edges,
            counts,
        })
    }

    /// `bin_start, bin_end, count` rows.
    pub fn to_table(&self) -> DataSet {
        let schema = Schema::new(vec![
            Field::new("bin_start", DataType::Float64),
            Field::new("bin_end", DataType::Float64),
            Field::new("count", DataType::Int64),
        ]);
        let rows = self
            .counts
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                vec![
                    Value::Float64(self.edges[i]),
                    Value::Float64(self.edges[i + 1]),
                    Value::Int64(c as i64),
                ]
            })
            .collect();
        DataSet::new(schema, rows)
    }
}

/// Pearson correlation matrix over pairwise-complete observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub columns: Vec<String>,
    /// `None` where fewer than two paired observations exist or a side has zero variance.
    pub matrix: Vec<Vec<Option<f64>>>,
}

impl Correlation {
    /// Correlate the numeric `columns` of `table`.
    pub fn compute(table: &DataSet, columns: &[String]) -> Self {
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| table.schema.index_of(c))
            .collect();
        let matrix = indices
            .iter()
            .map(|&a| indices.iter().map(|&b| pearson(table, a, b)).collect())
            .collect();
        Self {
            columns: columns.to_vec(),
            matrix,
        }
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.matrix[i][j]
    }

    /// A `column` label column followed by one Float64 column per correlated column.
    pub fn to_table(&self) -> DataSet {
        let mut fields = vec![Field::new("column", DataType::Utf8)];
        fields.extend(self.columns.iter().map(|c| Field::new(c.clone(), DataType::Float64)));
        let rows = self
            .columns
            .iter()
            .zip(&self.matrix)
            .map(|(name, row)| {
                let mut out = vec![Value::Utf8(name.clone())];
                out.extend(row.iter().map(|r| r.map(Value::Float64).unwrap_or(Value::Null)));
                out
            })
            .collect();
        DataSet::new(Schema::new(fields), rows)
    }
}

fn pearson(table: &DataSet, a: usize, b: usize) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = table
        .rows
        .iter()
        .filter_map(|row| Some((row.get(a)?.as_f64()?, row.get(b)?.as_f64()?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
        syy += (y - my) * (y - my);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    if a == b {
        return Some(1.0);
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}
