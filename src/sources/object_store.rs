//! Object-store driver.
//!
//! Objects are CSV or JSON files addressed by `(bucket, key)`. The location passed to
//! [`SourceDriver::read`]/[`SourceDriver::write`] is the object key; the bucket comes from the
//! `bucket` config key. The object format comes from `file_type`, else the key's extension,
//! else CSV.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::{Options, SourceConfig};
use crate::error::{SourceError, SourceResult};
use crate::types::DataSet;

use super::{csv, json, SourceDriver, SourceKind};

pub(crate) const BACKEND: &str = "object_store";

/// Default root directory for [`LocalObjectStore`].
pub const DEFAULT_LOCAL_ROOT: &str = "object_store";

/// Byte-level access to an object store.
pub trait ObjectStoreClient: Send + Sync {
    /// Fetch the object at `bucket/key`.
    fn get(&self, bucket: &str, key: &str) -> SourceResult<Vec<u8>>;

    /// Store `bytes` at `bucket/key`, replacing any existing object.
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> SourceResult<()>;

    /// Create the bucket if it does not exist. Idempotent.
    fn ensure_bucket(&self, bucket: &str) -> SourceResult<()>;
}

/// An object store laid out on the local filesystem: one directory per bucket under `root`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from the config's `root` key, defaulting to [`DEFAULT_LOCAL_ROOT`].
    pub fn from_config(config: &SourceConfig) -> SourceResult<Self> {
        let root = config.str_key(BACKEND, "root")?.unwrap_or(DEFAULT_LOCAL_ROOT);
        Ok(Self::new(root))
    }

    fn bucket_path(&self, bucket: &str) -> SourceResult<PathBuf> {
        Ok(self.root.join(checked_relative(bucket, "bucket")?))
    }

    fn object_path(&self, bucket: &str, key: &str) -> SourceResult<PathBuf> {
        Ok(self.bucket_path(bucket)?.join(checked_relative(key, "key")?))
    }
}

/// Reject names that would escape the bucket (absolute paths, `..`).
fn checked_relative<'a>(name: &'a str, what: &str) -> SourceResult<&'a Path> {
    let path = Path::new(name);
    let ok = !name.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(path)
    } else {
        Err(SourceError::Backend {
            backend: BACKEND,
            message: format!("invalid object {what} '{name}'"),
        })
    }
}

impl ObjectStoreClient for LocalObjectStore {
    fn get(&self, bucket: &str, key: &str) -> SourceResult<Vec<u8>> {
        Ok(fs::read(self.object_path(bucket, key)?)?)
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> SourceResult<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    fn ensure_bucket(&self, bucket: &str) -> SourceResult<()> {
        fs::create_dir_all(self.bucket_path(bucket)?)?;
        Ok(())
    }
}

/// Encoding of the objects a driver reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFormat {
    Csv,
    Json,
}

impl ObjectFormat {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Reads and writes CSV/JSON objects in one bucket.
pub struct ObjectStoreDriver {
    config: SourceConfig,
    bucket: String,
    file_type: Option<ObjectFormat>,
    client: Arc<dyn ObjectStoreClient>,
}

impl std::fmt::Debug for ObjectStoreDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreDriver")
            .field("bucket", &self.bucket)
            .field("file_type", &self.file_type)
            .finish()
    }
}

impl ObjectStoreDriver {
    pub fn new(config: SourceConfig, client: Arc<dyn ObjectStoreClient>) -> SourceResult<Self> {
        let bucket = config.required_str(BACKEND, "bucket")?.to_string();
        let file_type = match config.str_key(BACKEND, "file_type")? {
            None => None,
            Some(t) => Some(ObjectFormat::parse(t).ok_or_else(|| SourceError::InvalidOption {
                backend: BACKEND,
                option: "file_type".to_string(),
                message: format!("unsupported file_type '{t}' (expected csv or json)"),
            })?),
        };
        Ok(Self {
            config,
            bucket,
            file_type,
            client,
        })
    }

    fn format_for(&self, key: &str) -> ObjectFormat {
        self.file_type
            .or_else(|| {
                Path::new(key)
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(ObjectFormat::parse)
            })
            .unwrap_or(ObjectFormat::Csv)
    }

    fn read_options(&self) -> SourceResult<&Options> {
        Ok(self
            .config
            .map_key(BACKEND, "read_options")?
            .unwrap_or(&self.config.options))
    }

    fn lines(&self) -> SourceResult<bool> {
        Ok(self.config.bool_key(BACKEND, "lines")?.unwrap_or(false))
    }
}

impl SourceDriver for ObjectStoreDriver {
    fn kind(&self) -> SourceKind {
        SourceKind::ObjectStore
    }

    fn read(&self, location: &str) -> SourceResult<DataSet> {
        let bytes = self.client.get(&self.bucket, location)?;
        let schema = self.config.schema.as_ref();
        match self.format_for(location) {
            ObjectFormat::Csv => csv::read_csv(bytes.as_slice(), self.read_options()?, schema),
            ObjectFormat::Json => {
                let text = String::from_utf8(bytes).map_err(|e| SourceError::Backend {
                    backend: BACKEND,
                    message: format!("object '{location}' is not utf-8: {e}"),
                })?;
                json::read_json_str(&text, self.lines()?, self.read_options()?, schema)
            }
        }
    }

    fn write(&self, table: &DataSet, location: &str) -> SourceResult<()> {
        let mut bytes = Vec::new();
        match self.format_for(location) {
            ObjectFormat::Csv => csv::write_csv(&mut bytes, table, &self.config.write_options)?,
            ObjectFormat::Json => {
                json::write_json(&mut bytes, table, self.lines()?, &self.config.write_options)?
            }
        }
        self.client.ensure_bucket(&self.bucket)?;
        self.client.put(&self.bucket, location, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_escaping_the_bucket_are_rejected() {
        let store = LocalObjectStore::new("unused-root");
        assert!(store.object_path("b", "../etc/passwd").is_err());
        assert!(store.object_path("b", "/abs").is_err());
        assert!(store.object_path("", "k").is_err());
        assert_eq!(
            store.object_path("b", "nested/k.csv").unwrap(),
            PathBuf::from("unused-root/b/nested/k.csv")
        );
    }

    #[test]
    fn format_follows_config_then_extension() {
        let client: Arc<dyn ObjectStoreClient> = Arc::new(LocalObjectStore::new("unused-root"));
        let driver =
            ObjectStoreDriver::new(SourceConfig::default().with("bucket", "b"), Arc::clone(&client)).unwrap();
        assert_eq!(driver.format_for("a.json"), ObjectFormat::Json);
        assert_eq!(driver.format_for("a"), ObjectFormat::Csv);

        let driver = ObjectStoreDriver::new(
            SourceConfig::default().with("bucket", "b").with("file_type", "json"),
            client,
        )
        .unwrap();
        assert_eq!(driver.format_for("a.csv"), ObjectFormat::Json);
    }

    #[test]
    fn bucket_is_required() {
        let client: Arc<dyn ObjectStoreClient> = Arc::new(LocalObjectStore::new("unused-root"));
        let err = ObjectStoreDriver::new(SourceConfig::default(), client).unwrap_err();
        assert!(err.to_string().contains("'bucket'"));
    }
}
