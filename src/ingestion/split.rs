//! Deterministic train/test partitioning.
//!
//! The test rows are a uniform sample without replacement drawn from a seeded [`StdRng`]. Both
//! partitions keep the raw row order, so identical input, fraction and seed always give
//! identical partitions.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::{Error, Result};
use crate::types::DataSet;

/// Absorbs float error in `n * fraction` (`5 * 0.2` is slightly above 1).
const ROUNDING_SLACK: f64 = 1e-9;

/// Row indices of each partition, ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Number of test rows for `n` raw rows: `ceil(n * fraction)`, clamped so both partitions are
/// non-empty.
pub fn test_size(n: usize, fraction: f64) -> Result<usize> {
    if n < 2 {
        return Err(Error::Split {
            message: format!("need at least 2 rows to split, got {n}"),
        });
    }
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(Error::Split {
            message: format!("test fraction must be in (0, 1), got {fraction}"),
        });
    }
    let raw = (n as f64 * fraction - ROUNDING_SLACK).ceil() as usize;
    Ok(raw.clamp(1, n - 1))
}

/// Partition `0..n` into disjoint train/test index sets.
pub fn split_indices(n: usize, fraction: f64, seed: u64) -> Result<SplitIndices> {
    let n_test = test_size(n, fraction)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut is_test = vec![false; n];
    for i in rand::seq::index::sample(&mut rng, n, n_test).into_vec() {
        is_test[i] = true;
    }

    let (test, train): (Vec<usize>, Vec<usize>) = (0..n).partition(|&i| is_test[i]);
    Ok(SplitIndices { train, test })
}

/// Split `table` into `(train, test)`.
pub fn train_test_split(table: &DataSet, fraction: f64, seed: u64) -> Result<(DataSet, DataSet)> {
    let indices = split_indices(table.row_count(), fraction, seed)?;
    Ok((table.select_rows(&indices.train), table.select_rows(&indices.test)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SPLIT_SEED, TEST_FRACTION};

    #[test]
    fn test_size_rounds_up_and_clamps() {
        assert_eq!(test_size(2, 0.2).unwrap(), 1);
        assert_eq!(test_size(4, 0.2).unwrap(), 1);
        assert_eq!(test_size(5, 0.2).unwrap(), 1);
        assert_eq!(test_size(6, 0.2).unwrap(), 2);
        assert_eq!(test_size(10, 0.2).unwrap(), 2);
        assert_eq!(test_size(3, 0.9).unwrap(), 2);
    }

    #[test]
    fn too_few_rows_is_a_split_error() {
        assert!(matches!(test_size(0, 0.2), Err(Error::Split { .. })));
        assert!(matches!(test_size(1, 0.2), Err(Error::Split { .. })));
        assert!(matches!(test_size(10, 1.0), Err(Error::Split { .. })));
        assert!(matches!(test_size(10, f64::NAN), Err(Error::Split { .. })));
    }

    #[test]
    fn partitions_are_disjoint_and_cover_all_rows() {
        for n in 2..40 {
            let split = split_indices(n, TEST_FRACTION, SPLIT_SEED).unwrap();
            assert_eq!(split.train.len() + split.test.len(), n);
            let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
            all.sort_unstable();
            assert_eq!(all, (0..n).collect::<Vec<_>>());
            assert!(split.train.windows(2).all(|w| w[0] < w[1]));
            assert!(split.test.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn same_seed_same_split() {
        let a = split_indices(100, TEST_FRACTION, SPLIT_SEED).unwrap();
        let b = split_indices(100, TEST_FRACTION, SPLIT_SEED).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.test.len(), 20);
    }

    #[test]
    fn table_split_selects_rows() {
        let table = crate::types::sample_table();
        let (train, test) = train_test_split(&table, TEST_FRACTION, SPLIT_SEED).unwrap();
        assert_eq!(train.row_count(), 2);
        assert_eq!(test.row_count(), 1);
        assert_eq!(train.schema, table.schema);
        assert!(!train.rows.contains(&test.rows[0]));
    }
}
