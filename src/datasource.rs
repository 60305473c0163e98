//! Data source façade.
//!
//! [`DataSource`] is the single read/write entry point used by the ingestion manager, the
//! summary writer and the CLI. Each call resolves a [`SourceKind`] through the
//! [`SourceRegistry`], builds a fresh driver, delegates to it, and wraps any driver failure into
//! a [`DataSourceError`] that carries the operation, the kind and the location. No table state is
//! kept between calls.
//!
//! When an observer is configured, each call reports:
//!
//! - `on_success` on success, with row/column stats
//! - `on_failure` on failure, with a computed [`Severity`]
//! - `on_alert` on failure when the severity is >= the alert threshold
//!
//! ```no_run
//! use ml_ingest::datasource::DataSource;
//! use ml_ingest::types::sample_table;
//!
//! # fn main() -> ml_ingest::Result<()> {
//! let source = DataSource::new();
//! source.write_table(&sample_table(), "data/sample.json")?;
//! let table = source.read_table("data/sample.json")?;
//! assert_eq!(table.row_count(), 3);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::SourceConfig;
use crate::error::{DataSourceError, Error, Result, SourceOperation, SourceResult};
use crate::sources::{
    ensure_parent_dir, Connectors, DataSourceObserver, KeyValueClient, MessageQueue,
    ObjectStoreClient, Severity, SourceContext, SourceDriver, SourceKind, SourceRegistry,
    SourceStats,
};
use crate::types::DataSet;

/// Explicit source selection: a discriminator plus the driver configuration.
///
/// When `kind` is `None` the kind is inferred from the location's extension. When `location` is
/// `None` the config's `location` is used, and failing that the driver falls back on its own
/// config keys (`table`, `pattern`, `topic`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRequest {
    pub kind: Option<String>,
    pub location: Option<String>,
    pub config: SourceConfig,
}

impl SourceRequest {
    /// A request resolved by the location's extension, with default configuration.
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::default()
        }
    }

    /// A request for an explicit backend kind.
    pub fn of_kind(kind: impl Into<String>, config: SourceConfig) -> Self {
        Self {
            kind: Some(kind.into()),
            location: None,
            config,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_config(mut self, config: SourceConfig) -> Self {
        self.config = config;
        self
    }

    /// Parse a request from a JSON source configuration.
    ///
    /// The kind is taken from a `kind` (or `source_type`) key; every other key is driver config.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let mut config = SourceConfig::from_json_str(input)?;
        let kind = match config
            .extra
            .remove("kind")
            .or_else(|| config.extra.remove("source_type"))
        {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s),
            Some(other) => {
                return Err(Error::Config {
                    message: format!("source kind must be a string, got {other}"),
                });
            }
        };
        Ok(Self {
            kind,
            location: None,
            config,
        })
    }

    fn effective_location(&self) -> &str {
        self.location
            .as_deref()
            .or(self.config.location.as_deref())
            .unwrap_or("")
    }
}

/// Stateless coordinator over the registered drivers.
#[derive(Clone)]
pub struct DataSource {
    registry: Arc<SourceRegistry>,
    connectors: Connectors,
    observer: Option<Arc<dyn DataSourceObserver>>,
    alert_at_or_above: Severity,
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("discriminators", &self.registry.discriminators())
            .field("connectors", &self.connectors)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for DataSource {
    fn default() -> Self {
        Self {
            registry: SourceRegistry::global(),
            connectors: Connectors::default(),
            observer: None,
            alert_at_or_above: Severity::Critical,
        }
    }
}

impl DataSource {
    /// Façade over the global built-in registry, without external clients or observer.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: Arc<SourceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_connectors(mut self, connectors: Connectors) -> Self {
        self.connectors = connectors;
        self
    }

    pub fn with_object_store(mut self, client: Arc<dyn ObjectStoreClient>) -> Self {
        self.connectors.object_store = Some(client);
        self
    }

    pub fn with_key_value(mut self, client: Arc<dyn KeyValueClient>) -> Self {
        self.connectors.key_value = Some(client);
        self
    }

    pub fn with_queue(mut self, client: Arc<dyn MessageQueue>) -> Self {
        self.connectors.queue = Some(client);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DataSourceObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Severity at which failures are also reported through `on_alert`. Defaults to
    /// [`Severity::Critical`].
    pub fn with_alert_threshold(mut self, severity: Severity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Read the table at `location`, selecting the driver by extension.
    pub fn read_table(&self, location: &str) -> Result<DataSet> {
        self.read(&SourceRequest::at(location))
    }

    /// Write `table` to `location`, selecting the driver by extension. Missing parent
    /// directories are created first.
    pub fn write_table(&self, table: &DataSet, location: &str) -> Result<()> {
        self.write(table, &SourceRequest::at(location))
    }

    /// Read through an explicitly configured source.
    pub fn read(&self, request: &SourceRequest) -> Result<DataSet> {
        let kind = self.resolve(request)?;
        self.dispatch(
            SourceOperation::Read,
            kind,
            request,
            |table: &DataSet| stats_for(table),
            |driver, location| driver.read(location),
        )
    }

    /// Write through an explicitly configured source.
    pub fn write(&self, table: &DataSet, request: &SourceRequest) -> Result<()> {
        let kind = self.resolve(request)?;
        self.dispatch(
            SourceOperation::Write,
            kind,
            request,
            |_: &()| stats_for(table),
            |driver, location| driver.write(table, location),
        )
    }

    /// Write the demonstration table through the resolved driver and return it.
    pub fn write_sample(&self, request: &SourceRequest) -> Result<DataSet> {
        let kind = self.resolve(request)?;
        self.dispatch(
            SourceOperation::Write,
            kind,
            request,
            |table: &DataSet| stats_for(table),
            |driver, location| driver.write_sample_table(location),
        )
    }

    /// Which driver kind a request selects.
    pub fn resolve(&self, request: &SourceRequest) -> Result<SourceKind> {
        let kind = match request.kind.as_deref() {
            Some(token) => self.registry.resolve_by_discriminator(token)?,
            None => self
                .registry
                .resolve_by_location(request.effective_location())?,
        };
        Ok(kind)
    }

    fn dispatch<T>(
        &self,
        operation: SourceOperation,
        kind: SourceKind,
        request: &SourceRequest,
        stats: impl FnOnce(&T) -> SourceStats,
        call: impl FnOnce(&dyn SourceDriver, &str) -> SourceResult<T>,
    ) -> Result<T> {
        let ctx = SourceContext {
            operation,
            kind,
            location: request.effective_location().to_string(),
        };
        let span = tracing::info_span!(
            "datasource",
            operation = %ctx.operation,
            kind = %ctx.kind,
            location = %ctx.location
        );
        let _enter = span.enter();
        tracing::info!("{} {} source at '{}'", ctx.operation, ctx.kind, ctx.location);

        let result = kind
            .driver(request.config.clone(), &self.connectors)
            .and_then(|driver| {
                if operation == SourceOperation::Write && kind.is_file_based() {
                    ensure_parent_dir(Path::new(&ctx.location))?;
                }
                call(driver.as_ref(), &ctx.location)
            });

        match result {
            Ok(value) => {
                let stats = stats(&value);
                tracing::debug!(rows = stats.rows, columns = stats.columns, "source call succeeded");
                if let Some(obs) = self.observer.as_ref() {
                    obs.on_success(&ctx, stats);
                }
                Ok(value)
            }
            Err(source) => {
                let severity = Severity::for_error(&source);
                tracing::warn!(?severity, error = %source, "source call failed");
                if let Some(obs) = self.observer.as_ref() {
                    obs.on_failure(&ctx, severity, &source);
                    if severity >= self.alert_at_or_above {
                        obs.on_alert(&ctx, severity, &source);
                    }
                }
                Err(DataSourceError {
                    operation: ctx.operation,
                    kind: ctx.kind,
                    location: ctx.location,
                    source,
                }
                .into())
            }
        }
    }
}

fn stats_for(table: &DataSet) -> SourceStats {
    SourceStats {
        rows: table.row_count(),
        columns: table.column_count(),
    }
}
