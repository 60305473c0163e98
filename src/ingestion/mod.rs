//! Ingestion manager: load → split → persist raw/train/test → reload.
//!
//! One [`IngestionManager::run`] reads the configured ingest location through the
//! [`DataSource`] façade, writes the raw table to its artifact path, splits it with the fixed
//! [`TEST_FRACTION`] and [`SPLIT_SEED`], writes both partitions, and returns the three tables
//! **as reloaded from the artifacts**. The three tables are staged first and only replace the
//! previous artifacts once all of them are written. Any failure aborts the run and leaves the
//! manager in [`IngestionState::Failed`]; nothing is retried.
//!
//! Artifacts are overwritten on every run. Two managers sharing one artifact directory must not
//! run concurrently (last writer wins).
//!
//! ```no_run
//! use ml_ingest::config::IngestionConfig;
//! use ml_ingest::datasource::DataSource;
//! use ml_ingest::ingestion::{IngestionManager, Partition};
//!
//! # fn main() -> ml_ingest::Result<()> {
//! let mut manager = IngestionManager::new(IngestionConfig::default(), DataSource::new());
//! manager.set_ingest_location("data/sample.csv");
//! let parts = manager.run()?;
//! println!("raw={} train={} test={}", parts.raw.row_count(), parts.train.row_count(), parts.test.row_count());
//!
//! let train = manager.get_model_data(Partition::Train)?;
//! # let _ = train;
//! # Ok(())
//! # }
//! ```

pub mod split;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::{IngestionConfig, SPLIT_SEED, TEST_FRACTION};
use crate::datasource::DataSource;
use crate::error::{Error, Result};
use crate::types::DataSet;

pub use split::{split_indices, test_size, train_test_split, SplitIndices};

const STAGING_DIR: &str = ".staging";

/// One of the persisted tables of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Raw,
    Train,
    Test,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Raw, Partition::Train, Partition::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Train => "train",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "train" => Ok(Self::Train),
            "test" => Ok(Self::Test),
            _ => Err(Error::UnknownPartition { name: s.to_string() }),
        }
    }
}

/// The raw/train/test triple of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSet {
    pub raw: DataSet,
    pub train: DataSet,
    pub test: DataSet,
}

impl PartitionSet {
    pub fn get(&self, partition: Partition) -> &DataSet {
        match partition {
            Partition::Raw => &self.raw,
            Partition::Train => &self.train,
            Partition::Test => &self.test,
        }
    }
}

/// Lifecycle of one run. `Ready` and `Failed` are terminal for that run; calling
/// [`IngestionManager::run`] again starts over from `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionState {
    Idle,
    Loading,
    Splitting,
    Persisted,
    Ready,
    Failed,
}

/// Drives ingestion runs against one artifact directory.
#[derive(Debug)]
pub struct IngestionManager {
    config: IngestionConfig,
    source: DataSource,
    state: IngestionState,
}

impl IngestionManager {
    pub fn new(config: IngestionConfig, source: DataSource) -> Self {
        Self {
            config,
            source,
            state: IngestionState::Idle,
        }
    }

    pub fn state(&self) -> IngestionState {
        self.state
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// Source location for the next run. Existing artifacts are left alone.
    pub fn set_ingest_location(&mut self, location: impl Into<String>) {
        self.config.ingest_location = Some(location.into());
    }

    /// Artifact path of `partition`.
    pub fn partition_path(&self, partition: Partition) -> PathBuf {
        self.config.artifact_path(partition)
    }

    /// Run one ingestion and return the partitions reloaded from their artifacts.
    pub fn run(&mut self) -> Result<PartitionSet> {
        match self.run_stages() {
            Ok(parts) => {
                self.transition(IngestionState::Ready);
                Ok(parts)
            }
            Err(e) => {
                tracing::error!(error = %e, "ingestion run failed");
                self.transition(IngestionState::Failed);
                Err(e)
            }
        }
    }

    fn run_stages(&mut self) -> Result<PartitionSet> {
        let location = self
            .config
            .ingest_location
            .clone()
            .ok_or_else(|| Error::Config {
                message: "no ingest location set".to_string(),
            })?;

        self.transition(IngestionState::Loading);
        let raw = self.source.read_table(&location)?;
        tracing::info!(location = %location, rows = raw.row_count(), "raw table loaded");

        self.transition(IngestionState::Splitting);
        let (train, test) = split::train_test_split(&raw, TEST_FRACTION, SPLIT_SEED)?;
        tracing::info!(train = train.row_count(), test = test.row_count(), "split complete");

        let parts = PartitionSet { raw, train, test };
        self.persist(&parts)?;
        self.transition(IngestionState::Persisted);

        // Hand back what is durably stored, not the pre-write tables.
        self.get_partition_set()
    }

    /// Write all three partitions next to the artifacts, then move them into place. A failure
    /// before the move leaves the previous run's artifacts untouched.
    fn persist(&self, parts: &PartitionSet) -> Result<()> {
        let staging = self.config.artifact_dir.join(STAGING_DIR);
        for partition in Partition::ALL {
            let path = self.staging_path(&staging, partition);
            if let Err(e) = self
                .source
                .write_table(parts.get(partition), &path.to_string_lossy())
            {
                let _ = fs::remove_dir_all(&staging);
                return Err(e);
            }
        }

        for partition in Partition::ALL {
            let from = self.staging_path(&staging, partition);
            let to = self.partition_path(partition);
            if let Err(source) = fs::rename(&from, &to) {
                // Some partitions may already be replaced; drop the mixed set.
                self.discard_artifacts();
                return Err(Error::Artifact { path: to, source });
            }
        }

        if let Err(e) = fs::remove_dir_all(&staging) {
            tracing::warn!(path = %staging.display(), error = %e, "could not remove staging directory");
        }
        Ok(())
    }

    fn staging_path(&self, staging: &Path, partition: Partition) -> PathBuf {
        let name = self
            .partition_path(partition)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| partition.as_str().into());
        staging.join(name)
    }

    fn discard_artifacts(&self) {
        for partition in Partition::ALL {
            let path = self.partition_path(partition);
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove artifact");
                }
            }
        }
    }

    fn transition(&mut self, next: IngestionState) {
        tracing::debug!(from = ?self.state, to = ?next, "ingestion state");
        self.state = next;
    }

    /// Reload one partition from its artifact.
    ///
    /// Fails with [`Error::ArtifactNotFound`] if no run has persisted it yet, or if this
    /// manager's last run failed.
    pub fn get_model_data(&self, partition: Partition) -> Result<DataSet> {
        let path = self.partition_path(partition);
        if self.state == IngestionState::Failed || !path.exists() {
            return Err(Error::ArtifactNotFound { partition, path });
        }
        self.source.read_table(&path.to_string_lossy())
    }

    /// [`Self::get_model_data`] by partition name (`raw`, `train`, `test`).
    pub fn get_model_data_named(&self, name: &str) -> Result<DataSet> {
        self.get_model_data(name.parse()?)
    }

    /// Reload all three partitions.
    pub fn get_partition_set(&self) -> Result<PartitionSet> {
        Ok(PartitionSet {
            raw: self.get_model_data(Partition::Raw)?,
            train: self.get_model_data(Partition::Train)?,
            test: self.get_model_data(Partition::Test)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_names_parse_case_insensitively() {
        assert_eq!("raw".parse::<Partition>().unwrap(), Partition::Raw);
        assert_eq!(" Train ".parse::<Partition>().unwrap(), Partition::Train);
        assert_eq!("TEST".parse::<Partition>().unwrap(), Partition::Test);
        let err = "validation".parse::<Partition>().unwrap_err();
        assert!(matches!(err, Error::UnknownPartition { ref name } if name == "validation"));
    }

    #[test]
    fn run_without_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = IngestionManager::new(IngestionConfig::in_dir(dir.path()), DataSource::new());
        assert_eq!(manager.state(), IngestionState::Idle);
        assert!(matches!(manager.run(), Err(Error::Config { .. })));
        assert_eq!(manager.state(), IngestionState::Failed);
    }

    #[test]
    fn reload_before_run_is_artifact_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let manager = IngestionManager::new(IngestionConfig::in_dir(dir.path()), DataSource::new());
        let err = manager.get_model_data(Partition::Test).unwrap_err();
        assert!(matches!(err, Error::ArtifactNotFound { partition: Partition::Test, .. }));
    }
}
