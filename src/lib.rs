//! `ml-ingest` reads and writes tables through pluggable storage drivers and turns a source
//! table into reproducible raw/train/test artifacts.
//!
//! Every driver exchanges the same in-memory [`types::DataSet`]. Schemas are inferred from the
//! source data unless a [`types::Schema`] is configured.
//!
//! ## Sources
//!
//! **By file extension:**
//!
//! - **CSV**: `.csv`
//! - **JSON**: `.json` (array of records, or NDJSON with `lines: true`)
//! - **Pickled table**: `.pkl`, `.pickle`
//! - **Compressed table**: `.joblib` (zstd, level from `compress`)
//!
//! **By explicit kind** (see [`datasource::SourceRequest`]):
//!
//! - **SQL** (`sql`, `sqlite`): SQLite tables and queries
//! - **Object store** (`object_store`, `s3`): CSV/JSON objects in a bucket
//! - **Key-value store** (`kv`, `redis`): one JSON record per key
//! - **Message queue** (`queue`, `kafka`): bounded, read-only consumption of JSON messages
//!
//! Unknown extensions or kinds are an [`error::UnsupportedSourceError`]; there is no fallback.
//!
//! ## Quick example: ingest and split
//!
//! ```no_run
//! use ml_ingest::config::IngestionConfig;
//! use ml_ingest::datasource::DataSource;
//! use ml_ingest::ingestion::{IngestionManager, Partition};
//!
//! # fn main() -> ml_ingest::Result<()> {
//! let mut manager = IngestionManager::new(IngestionConfig::in_dir("artifacts"), DataSource::new());
//! manager.set_ingest_location("data/sample.csv");
//! let parts = manager.run()?;
//! assert_eq!(parts.train.row_count() + parts.test.row_count(), parts.raw.row_count());
//!
//! // Later, from another stage:
//! let test = manager.get_model_data(Partition::Test)?;
//! println!("{test}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Explicitly configured sources
//!
//! ```no_run
//! use ml_ingest::datasource::{DataSource, SourceRequest};
//! use ml_ingest::types::sample_table;
//!
//! # fn main() -> ml_ingest::Result<()> {
//! let request = SourceRequest::from_json_str(
//!     r#"{"kind": "sql", "database": "data/app.sqlite", "table": "people"}"#,
//! )?;
//! let source = DataSource::new();
//! source.write(&sample_table(), &request)?;
//! let people = source.read(&request)?;
//! println!("rows={}", people.row_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`sources`]: the driver trait, one driver per backend, the registry and observers
//! - [`datasource`]: the façade every caller goes through
//! - [`ingestion`]: the ingestion manager and the train/test split
//! - [`summary`]: descriptive statistics, histograms and correlations of a table
//! - [`types`], [`infer`]: the table model and schema inference
//! - [`config`], [`error`], [`logging`]: configuration, error types and subscriber setup
//! - [`processing`]: column reductions

pub mod config;
pub mod datasource;
pub mod error;
pub mod infer;
pub mod ingestion;
pub mod logging;
pub mod processing;
pub mod sources;
pub mod summary;
pub mod types;

pub use datasource::{DataSource, SourceRequest};
pub use error::{DataSourceError, Error, Result, SourceError, SourceResult, UnsupportedSourceError};
pub use ingestion::{IngestionManager, Partition, PartitionSet};
