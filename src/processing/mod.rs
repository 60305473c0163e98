//! In-memory column reductions used by the summary generator.
//!
//! ```rust
//! use ml_ingest::processing::{reduce, ReduceOp};
//! use ml_ingest::types::{sample_table, Value};
//!
//! let ds = sample_table();
//! assert_eq!(reduce(&ds, "id", ReduceOp::Sum), Some(Value::Int64(6)));
//! assert_eq!(reduce(&ds, "name", ReduceOp::DistinctCount), Some(Value::Int64(3)));
//! ```

pub mod reduce;

pub use reduce::{mean, numeric_values, reduce, sample_std, ReduceOp};
