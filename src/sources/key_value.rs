//! Key-value store driver.
//!
//! Rows are stored one per key as JSON objects under `<prefix>:<row index>`, with the index
//! zero-padded so lexical key order matches row order. Reading a plain prefix reads
//! `<prefix>:*`; a location containing glob metacharacters is used as the key pattern as-is.
//! Values that are not JSON objects are read as `{key, value}` records. A write replaces every
//! key under its prefix.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::config::SourceConfig;
use crate::error::{SourceError, SourceResult};
use crate::infer;
use crate::types::DataSet;

use super::{json, SourceDriver, SourceKind};

pub(crate) const BACKEND: &str = "kv";

/// Minimal client surface of a key-value store.
pub trait KeyValueClient: Send + Sync {
    /// Keys matching a glob-style `pattern` (`*`, `?`, `[...]`).
    fn keys(&self, pattern: &str) -> SourceResult<Vec<String>>;

    /// Value at `key`, if any.
    fn get(&self, key: &str) -> SourceResult<Option<String>>;

    /// Set `key` to `value`.
    fn set(&self, key: &str, value: &str) -> SourceResult<()>;

    /// Remove `key`. Returns whether it existed.
    fn delete(&self, key: &str) -> SourceResult<bool>;
}

/// In-process key-value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> SourceError {
    SourceError::Backend {
        backend: BACKEND,
        message: "store lock poisoned".to_string(),
    }
}

impl KeyValueClient for MemoryKeyValueStore {
    fn keys(&self, pattern: &str) -> SourceResult<Vec<String>> {
        let pattern = glob::Pattern::new(pattern).map_err(|e| SourceError::InvalidOption {
            backend: BACKEND,
            option: "pattern".to_string(),
            message: e.to_string(),
        })?;
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.keys().filter(|k| pattern.matches(k)).cloned().collect())
    }

    fn get(&self, key: &str) -> SourceResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SourceResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> SourceResult<bool> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(entries.remove(key).is_some())
    }
}

/// Reads and writes rows as JSON values in a key-value store.
pub struct KeyValueDriver {
    config: SourceConfig,
    client: Arc<dyn KeyValueClient>,
}

impl std::fmt::Debug for KeyValueDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueDriver").field("config", &self.config).finish()
    }
}

impl KeyValueDriver {
    pub fn new(config: SourceConfig, client: Arc<dyn KeyValueClient>) -> Self {
        Self { config, client }
    }

    fn pattern_for(&self, location: &str) -> SourceResult<String> {
        if location.is_empty() {
            let pattern = self.config.str_key(BACKEND, "pattern")?.unwrap_or("*");
            return Ok(pattern.to_string());
        }
        if location.contains(['*', '?', '[']) {
            Ok(location.to_string())
        } else {
            Ok(format!("{location}:*"))
        }
    }

    fn prefix_for<'a>(&'a self, location: &'a str) -> SourceResult<&'a str> {
        match self.config.str_key(BACKEND, "key_prefix")? {
            Some(prefix) => Ok(prefix),
            None if !location.is_empty() => Ok(location),
            None => Err(SourceError::MissingConfig {
                backend: BACKEND,
                key: "key_prefix".to_string(),
            }),
        }
    }
}

impl SourceDriver for KeyValueDriver {
    fn kind(&self) -> SourceKind {
        SourceKind::KeyValue
    }

    fn read(&self, location: &str) -> SourceResult<DataSet> {
        let pattern = self.pattern_for(location)?;
        let mut keys = self.client.keys(&pattern)?;
        keys.sort();

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(raw) = self.client.get(&key)? else {
                continue;
            };
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(serde_json::Value::Object(map)) => records.push(map),
                _ => {
                    let mut map = serde_json::Map::new();
                    map.insert("key".to_string(), serde_json::Value::String(key));
                    map.insert("value".to_string(), serde_json::Value::String(raw));
                    records.push(map);
                }
            }
        }

        match self.config.schema.as_ref() {
            Some(schema) => {
                let values: Vec<serde_json::Value> =
                    records.into_iter().map(serde_json::Value::Object).collect();
                json::table_from_values(&values, Some(schema))
            }
            None => Ok(infer::infer_from_json_records(&records)),
        }
    }

    fn write(&self, table: &DataSet, location: &str) -> SourceResult<()> {
        let prefix = self.prefix_for(location)?;
        // Rows from an earlier, longer write under the same prefix must not survive.
        for key in self.client.keys(&format!("{}:*", glob::Pattern::escape(prefix)))? {
            self.client.delete(&key)?;
        }
        for (i, record) in json::table_to_records(table).iter().enumerate() {
            let value = serde_json::to_string(record)?;
            self.client.set(&format!("{prefix}:{i:08}"), &value)?;
        }
        Ok(())
    }
}
