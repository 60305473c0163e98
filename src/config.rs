//! Driver and pipeline configuration.
//!
//! [`SourceConfig`] is the per-driver option bag: a location, read-time `options`, write-time
//! `write_options`, an optional explicit [`Schema`], and any backend-specific keys (flattened
//! into [`SourceConfig::extra`]). Option values are untyped JSON values; each driver picks out
//! the names its backend understands.
//!
//! [`IngestionConfig`] locates the persisted raw/train/test artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, SourceError, SourceResult};
use crate::ingestion::Partition;
use crate::types::Schema;

/// Untyped option map.
pub type Options = serde_json::Map<String, serde_json::Value>;

/// Fraction of raw rows assigned to the test partition.
pub const TEST_FRACTION: f64 = 0.2;

/// Seed for the train/test row sample.
pub const SPLIT_SEED: u64 = 42;

/// Rows shown in a summary preview.
pub const PREVIEW_ROWS: usize = 5;

/// Equal-width bins per summary histogram.
pub const HISTOGRAM_BINS: usize = 10;

/// Default directory holding ingestion artifacts.
pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";

/// Default artifact format (a registered discriminator).
pub const DEFAULT_ARTIFACT_FORMAT: &str = "csv";

/// Configuration handed to a driver at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Default location for the driver (file path, table, key, topic...).
    #[serde(default, alias = "path", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Read-time options passed through to the backend.
    #[serde(default, skip_serializing_if = "Options::is_empty")]
    pub options: Options,
    /// Write-time options passed through to the backend.
    #[serde(default, skip_serializing_if = "Options::is_empty")]
    pub write_options: Options,
    /// Explicit schema; when set, text formats parse against it instead of inferring one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    /// Backend-specific keys (`database`, `bucket`, `compress`, `lines`, ...).
    #[serde(flatten)]
    pub extra: Options,
}

impl SourceConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| Error::Config {
            message: format!("source config: {e}"),
        })
    }

    /// Set a backend-specific key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Set a read option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Set a write option.
    pub fn with_write_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.write_options.insert(key.into(), value.into());
        self
    }

    /// Set the explicit schema.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// String-valued backend key.
    pub fn str_key(&self, backend: &'static str, key: &str) -> SourceResult<Option<&str>> {
        opt_str(&self.extra, backend, key)
    }

    /// String-valued backend key that must be present.
    pub fn required_str(&self, backend: &'static str, key: &str) -> SourceResult<&str> {
        self.str_key(backend, key)?
            .ok_or_else(|| SourceError::MissingConfig {
                backend,
                key: key.to_string(),
            })
    }

    /// Bool-valued backend key.
    pub fn bool_key(&self, backend: &'static str, key: &str) -> SourceResult<Option<bool>> {
        opt_bool(&self.extra, backend, key)
    }

    /// Unsigned-integer-valued backend key.
    pub fn u64_key(&self, backend: &'static str, key: &str) -> SourceResult<Option<u64>> {
        opt_u64(&self.extra, backend, key)
    }

    /// Nested option map stored under a backend key (e.g. an object store's `read_options`).
    pub fn map_key(&self, backend: &'static str, key: &str) -> SourceResult<Option<&Options>> {
        match self.extra.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(type_mismatch(backend, key, "an object", other)),
        }
    }
}

pub(crate) fn opt_str<'a>(
    map: &'a Options,
    backend: &'static str,
    key: &str,
) -> SourceResult<Option<&'a str>> {
    match map.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(type_mismatch(backend, key, "a string", other)),
    }
}

pub(crate) fn opt_bool(map: &Options, backend: &'static str, key: &str) -> SourceResult<Option<bool>> {
    match map.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(type_mismatch(backend, key, "a bool", other)),
    }
}

pub(crate) fn opt_u64(map: &Options, backend: &'static str, key: &str) -> SourceResult<Option<u64>> {
    match map.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| type_mismatch(backend, key, "a non-negative integer", v)),
    }
}

/// Single-byte option such as a delimiter or quote character.
pub(crate) fn opt_byte(map: &Options, backend: &'static str, key: &str) -> SourceResult<Option<u8>> {
    match opt_str(map, backend, key)? {
        None => Ok(None),
        Some(s) if s.len() == 1 => Ok(s.bytes().next()),
        Some(s) => Err(SourceError::InvalidOption {
            backend,
            option: key.to_string(),
            message: format!("expected a single ASCII character, got '{s}'"),
        }),
    }
}

fn type_mismatch(
    backend: &'static str,
    key: &str,
    expected: &str,
    got: &serde_json::Value,
) -> SourceError {
    SourceError::InvalidOption {
        backend,
        option: key.to_string(),
        message: format!("expected {expected}, got {got}"),
    }
}

/// Locations of the ingestion artifacts and the default ingest source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Directory holding `raw.<ext>`, `train.<ext>`, `test.<ext>`.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// Artifact file extension; must be a registered discriminator.
    #[serde(default = "default_artifact_format")]
    pub artifact_format: String,
    /// Source location for the next run.
    #[serde(default)]
    pub ingest_location: Option<String>,
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACT_DIR)
}

fn default_artifact_format() -> String {
    DEFAULT_ARTIFACT_FORMAT.to_string()
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            artifact_format: default_artifact_format(),
            ingest_location: None,
        }
    }
}

impl IngestionConfig {
    /// Artifacts under `dir`, default format.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        serde_json::from_str(&text).map_err(|e| Error::Config {
            message: format!("{}: {e}", path.display()),
        })
    }

    /// Path of the persisted artifact for `partition`.
    pub fn artifact_path(&self, partition: Partition) -> PathBuf {
        self.artifact_dir
            .join(format!("{}.{}", partition.as_str(), self.artifact_format))
    }

    pub fn raw_data_path(&self) -> PathBuf {
        self.artifact_path(Partition::Raw)
    }

    pub fn train_data_path(&self) -> PathBuf {
        self.artifact_path(Partition::Train)
    }

    pub fn test_data_path(&self) -> PathBuf {
        self.artifact_path(Partition::Test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_config_accepts_path_alias_and_flattens_backend_keys() {
        let cfg = SourceConfig::from_json_str(
            r#"{"path": "data/x.json", "lines": true, "options": {}, "write_options": {"indent": 2}}"#,
        )
        .unwrap();
        assert_eq!(cfg.location.as_deref(), Some("data/x.json"));
        assert_eq!(cfg.bool_key("json", "lines").unwrap(), Some(true));
        assert_eq!(opt_u64(&cfg.write_options, "json", "indent").unwrap(), Some(2));
    }

    #[test]
    fn typed_accessors_report_mismatches() {
        let cfg = SourceConfig::default().with("compress", "high");
        let err = cfg.u64_key("joblib", "compress").unwrap_err();
        assert!(err.to_string().contains("invalid joblib option 'compress'"));

        let err = cfg.required_str("sql", "database").unwrap_err();
        assert!(err.to_string().contains("missing required config key 'database'"));
    }

    #[test]
    fn artifact_paths_follow_format() {
        let cfg = IngestionConfig {
            artifact_format: "json".to_string(),
            ..IngestionConfig::in_dir("out")
        };
        assert_eq!(cfg.raw_data_path(), PathBuf::from("out/raw.json"));
        assert_eq!(cfg.train_data_path(), PathBuf::from("out/train.json"));
        assert_eq!(cfg.test_data_path(), PathBuf::from("out/test.json"));
    }

    #[test]
    fn ingestion_config_defaults_from_empty_json() {
        let cfg: IngestionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, IngestionConfig::default());
    }
}
