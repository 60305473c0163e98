//! Source drivers: one implementation of [`SourceDriver`] per storage backend.
//!
//! Most callers go through [`crate::datasource::DataSource`], which resolves a driver with the
//! [`SourceRegistry`], wraps failures, and logs. The drivers are public for callers that want to
//! work against one backend directly:
//!
//! - [`csv`]: delimited text (`.csv`)
//! - [`json`]: JSON records document or NDJSON (`.json`)
//! - [`object`]: serialized table objects, plain (`.pkl`) or zstd-compressed (`.joblib`)
//! - [`sql`]: SQLite tables and queries (`sql`)
//! - [`object_store`]: CSV/JSON objects in a bucket (`object_store`)
//! - [`key_value`]: JSON records under matching keys (`kv`)
//! - [`queue`]: bounded reads of JSON messages from a topic (`queue`, read-only)

pub mod csv;
pub mod json;
pub mod key_value;
pub mod object;
pub mod object_store;
pub mod observability;
pub mod queue;
pub mod registry;
pub mod sql;

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::SourceConfig;
use crate::error::SourceResult;
use crate::types::{sample_table, DataSet};

pub use key_value::{KeyValueClient, KeyValueDriver, MemoryKeyValueStore};
pub use object::{JoblibDriver, PickleDriver};
pub use object_store::{LocalObjectStore, ObjectStoreClient, ObjectStoreDriver};
pub use observability::{
    CompositeObserver, DataSourceObserver, FileObserver, Severity, SourceContext, SourceStats,
    TracingObserver,
};
pub use queue::{MemoryQueue, MessageQueue, QueueDriver};
pub use registry::SourceRegistry;
pub use sql::SqlDriver;

pub use self::csv::CsvDriver;
pub use self::json::JsonDriver;

/// Read/write contract every backend implements.
///
/// A driver is constructed from a [`SourceConfig`] and then asked to read or write tables at a
/// location whose meaning depends on the backend (file path, table, object key, key pattern,
/// topic).
pub trait SourceDriver: Send + Sync {
    /// Which backend this driver talks to.
    fn kind(&self) -> SourceKind;

    /// Read a table from `location`.
    fn read(&self, location: &str) -> SourceResult<DataSet>;

    /// Persist `table` at `location`, creating missing containers (directories, buckets,
    /// tables) where the backend supports it.
    fn write(&self, table: &DataSet, location: &str) -> SourceResult<()>;

    /// The demonstration table used for smoke tests.
    fn generate_sample_table(&self) -> DataSet {
        sample_table()
    }

    /// Write the demonstration table through this driver and return it.
    fn write_sample_table(&self, location: &str) -> SourceResult<DataSet> {
        let table = self.generate_sample_table();
        self.write(&table, location)?;
        Ok(table)
    }
}

/// Backend selected by a discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Delimited text.
    Csv,
    /// JSON records or NDJSON.
    Json,
    /// Serialized table object.
    Pickle,
    /// Compressed serialized table object.
    Joblib,
    /// Relational database.
    Sql,
    /// Object store bucket.
    ObjectStore,
    /// Key-value store.
    KeyValue,
    /// Message queue (read-only).
    Queue,
}

impl SourceKind {
    /// Canonical discriminator for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Pickle => "pkl",
            Self::Joblib => "joblib",
            Self::Sql => "sql",
            Self::ObjectStore => "object_store",
            Self::KeyValue => "kv",
            Self::Queue => "queue",
        }
    }

    /// `true` when locations for this kind are local file paths.
    pub fn is_file_based(self) -> bool {
        matches!(self, Self::Csv | Self::Json | Self::Pickle | Self::Joblib)
    }

    /// Construct the driver for this kind.
    ///
    /// Backends that talk to an external service take their client from `connectors`.
    pub fn driver(
        self,
        config: SourceConfig,
        connectors: &Connectors,
    ) -> SourceResult<Box<dyn SourceDriver>> {
        Ok(match self {
            Self::Csv => Box::new(CsvDriver::new(config)),
            Self::Json => Box::new(JsonDriver::new(config)),
            Self::Pickle => Box::new(PickleDriver::new(config)),
            Self::Joblib => Box::new(JoblibDriver::new(config)),
            Self::Sql => Box::new(SqlDriver::new(config)?),
            Self::ObjectStore => {
                let client = match &connectors.object_store {
                    Some(client) => Arc::clone(client),
                    None => Arc::new(LocalObjectStore::from_config(&config)?),
                };
                Box::new(ObjectStoreDriver::new(config, client)?)
            }
            Self::KeyValue => {
                let client = connectors.key_value.clone().ok_or_else(|| {
                    crate::error::SourceError::Backend {
                        backend: key_value::BACKEND,
                        message: "no key-value client configured".to_string(),
                    }
                })?;
                Box::new(KeyValueDriver::new(config, client))
            }
            Self::Queue => {
                let client = connectors.queue.clone().ok_or_else(|| {
                    crate::error::SourceError::Backend {
                        backend: queue::BACKEND,
                        message: "no message queue configured".to_string(),
                    }
                })?;
                Box::new(QueueDriver::new(config, client)?)
            }
        })
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clients for backends that live outside the process.
///
/// The object store falls back to a [`LocalObjectStore`] rooted at the config's `root` key when
/// no client is set; the key-value and queue drivers require one.
#[derive(Clone, Default)]
pub struct Connectors {
    pub object_store: Option<Arc<dyn ObjectStoreClient>>,
    pub key_value: Option<Arc<dyn KeyValueClient>>,
    pub queue: Option<Arc<dyn MessageQueue>>,
}

impl fmt::Debug for Connectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connectors")
            .field("object_store_set", &self.object_store.is_some())
            .field("key_value_set", &self.key_value.is_some())
            .field("queue_set", &self.queue.is_some())
            .finish()
    }
}

/// Create the parent directory of `path` if it is missing. Idempotent.
pub(crate) fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
