use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::ingestion::Partition;
use crate::sources::SourceKind;

/// Convenience result type for driver operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Convenience result type for everything above the drivers.
pub type Result<T> = std::result::Result<T, Error>;

/// Backend-level failure raised inside a driver.
///
/// This is a single error enum shared by every driver. Callers above the
/// [`crate::datasource::DataSource`] façade never see it directly; it arrives wrapped in a
/// [`DataSourceError`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-text error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encode/decode error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Relational database error.
    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// Object serialization error.
    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Object deserialization error.
    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// The input does not conform to the expected schema (missing fields/columns, etc.).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A value could not be parsed into the required [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// An option was not understood by the backend, or had the wrong type.
    #[error("invalid {backend} option '{option}': {message}")]
    InvalidOption {
        backend: &'static str,
        option: String,
        message: String,
    },

    /// A configuration key the backend requires is absent.
    #[error("missing required config key '{key}' for {backend}")]
    MissingConfig { backend: &'static str, key: String },

    /// Backend failure that has no structured error type of its own.
    #[error("{backend} error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    /// The backend cannot be written to.
    #[error("{backend} source is read-only")]
    ReadOnly { backend: &'static str },
}

/// The operation a driver was performing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOperation {
    Read,
    Write,
}

impl fmt::Display for SourceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// A driver failure wrapped at the façade boundary, carrying the operation, driver kind, and
/// failing location alongside the original cause.
#[derive(Debug, Error)]
#[error("failed to {operation} {kind} source at '{location}': {source}")]
pub struct DataSourceError {
    pub operation: SourceOperation,
    pub kind: SourceKind,
    pub location: String,
    #[source]
    pub source: SourceError,
}

impl DataSourceError {
    /// `true` if the failure was raised while reading.
    pub fn is_read(&self) -> bool {
        self.operation == SourceOperation::Read
    }

    /// `true` if the failure was raised while writing.
    pub fn is_write(&self) -> bool {
        self.operation == SourceOperation::Write
    }
}

/// No driver is registered for the discriminator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported source '{token}'")]
pub struct UnsupportedSourceError {
    pub token: String,
}

/// Error type returned by the façade, the ingestion manager, and the summary generator.
#[derive(Debug, Error)]
pub enum Error {
    /// The discriminator (extension or kind) has no registered driver.
    #[error(transparent)]
    Unsupported(#[from] UnsupportedSourceError),

    /// A driver read or write failed.
    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    /// A reload was requested for a partition that has not been persisted yet.
    #[error("artifact for partition '{partition}' not found at {}", path.display())]
    ArtifactNotFound { partition: Partition, path: PathBuf },

    /// A partition name other than `raw`, `train` or `test`.
    #[error("unknown partition '{name}' (expected raw, train or test)")]
    UnknownPartition { name: String },

    /// The split invariants could not be satisfied.
    #[error("split failed: {message}")]
    Split { message: String },

    /// Staged artifacts could not be moved into place.
    #[error("cannot commit artifact {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be loaded or is inconsistent.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_missing(path: &str) -> SourceResult<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    #[test]
    fn driver_errors_convert_through_the_source_result_alias() {
        let err = open_missing("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));

        let wrapped = DataSourceError {
            operation: SourceOperation::Read,
            kind: SourceKind::Csv,
            location: "here.csv".to_string(),
            source: err,
        };
        let top: Result<()> = Err(wrapped.into());
        assert!(matches!(top, Err(Error::DataSource(ref e)) if e.is_read()));
    }
}
