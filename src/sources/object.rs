//! Serialized-object drivers.
//!
//! `.pkl` files hold a whole [`DataSet`] encoded with `bincode` behind a short magic header, so
//! round trips are exact (types, nulls, column order). `.joblib` files hold the same payload in a
//! zstd frame; the `compress` config key sets the level (`0` stores it uncompressed).

use std::fs;
use std::path::Path;

use crate::config::{Options, SourceConfig};
use crate::error::{SourceError, SourceResult};
use crate::types::DataSet;

use super::{ensure_parent_dir, SourceDriver, SourceKind};

const MAGIC: &[u8; 4] = b"MLT1";
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Default zstd level for `.joblib` files.
pub const DEFAULT_COMPRESSION_LEVEL: u64 = 3;

const MAX_COMPRESSION_LEVEL: u64 = 22;

/// Encode a table into the object payload.
pub fn encode_table(table: &DataSet) -> SourceResult<Vec<u8>> {
    let mut out = MAGIC.to_vec();
    out.extend(bincode::serde::encode_to_vec(table, bincode::config::standard())?);
    Ok(out)
}

/// Decode an object payload written by [`encode_table`].
pub fn decode_table(bytes: &[u8]) -> SourceResult<DataSet> {
    let body = bytes.strip_prefix(MAGIC.as_slice()).ok_or_else(|| SourceError::SchemaMismatch {
        message: "not a serialized table (bad magic header)".to_string(),
    })?;
    let (table, _len): (DataSet, usize) =
        bincode::serde::decode_from_slice(body, bincode::config::standard())?;
    Ok(table)
}

fn reject_options(backend: &'static str, options: &Options) -> SourceResult<()> {
    match options.keys().next() {
        None => Ok(()),
        Some(key) => Err(SourceError::InvalidOption {
            backend,
            option: key.clone(),
            message: format!("{backend} takes no options"),
        }),
    }
}

/// Reads and writes `.pkl` files.
#[derive(Debug, Clone, Default)]
pub struct PickleDriver {
    config: SourceConfig,
}

impl PickleDriver {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }
}

impl SourceDriver for PickleDriver {
    fn kind(&self) -> SourceKind {
        SourceKind::Pickle
    }

    fn read(&self, location: &str) -> SourceResult<DataSet> {
        reject_options("pkl", &self.config.options)?;
        decode_table(&fs::read(location)?)
    }

    fn write(&self, table: &DataSet, location: &str) -> SourceResult<()> {
        reject_options("pkl", &self.config.write_options)?;
        let path = Path::new(location);
        ensure_parent_dir(path)?;
        fs::write(path, encode_table(table)?)?;
        Ok(())
    }
}

/// Reads and writes `.joblib` files.
#[derive(Debug, Clone, Default)]
pub struct JoblibDriver {
    config: SourceConfig,
}

impl JoblibDriver {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn level(&self) -> SourceResult<u64> {
        let level = self
            .config
            .u64_key("joblib", "compress")?
            .unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        if level > MAX_COMPRESSION_LEVEL {
            return Err(SourceError::InvalidOption {
                backend: "joblib",
                option: "compress".to_string(),
                message: format!("level must be 0..={MAX_COMPRESSION_LEVEL}, got {level}"),
            });
        }
        Ok(level)
    }
}

impl SourceDriver for JoblibDriver {
    fn kind(&self) -> SourceKind {
        SourceKind::Joblib
    }

    fn read(&self, location: &str) -> SourceResult<DataSet> {
        reject_options("joblib", &self.config.options)?;
        let bytes = fs::read(location)?;
        if bytes.starts_with(&ZSTD_MAGIC) {
            decode_table(&zstd::decode_all(bytes.as_slice())?)
        } else {
            decode_table(&bytes)
        }
    }

    fn write(&self, table: &DataSet, location: &str) -> SourceResult<()> {
        reject_options("joblib", &self.config.write_options)?;
        let level = self.level()?;
        let payload = encode_table(table)?;
        let bytes = if level == 0 {
            payload
        } else {
            // `level` is bounded by MAX_COMPRESSION_LEVEL.
            zstd::encode_all(payload.as_slice(), level as i32)?
        };

        let path = Path::new(location);
        ensure_parent_dir(path)?;
        fs::write(path, bytes)?;
        Ok(())
    }
}
