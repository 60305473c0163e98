use std::error::Error as StdError;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{SourceError, SourceOperation};

use super::SourceKind;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (typically I/O, connectivity or other infrastructure failures).
    Critical,
}

impl Severity {
    /// Classify a driver failure.
    pub fn for_error(e: &SourceError) -> Self {
        match e {
            SourceError::Io(_) => Self::Critical,
            SourceError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => Self::Critical,
                _ => Self::Error,
            },
            SourceError::Json(err) if err.is_io() => Self::Critical,
            SourceError::Sql(err) if error_chain_contains_io(err) => Self::Critical,
            SourceError::Backend { .. } => Self::Critical,
            _ => Self::Error,
        }
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

/// What a driver call was doing, and where.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub operation: SourceOperation,
    pub kind: SourceKind,
    pub location: String,
}

/// Minimal stats reported on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    pub rows: usize,
    pub columns: usize,
}

/// Observer interface for read/write outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait DataSourceObserver: Send + Sync {
    /// Called when a read or write succeeds.
    fn on_success(&self, _ctx: &SourceContext, _stats: SourceStats) {}

    /// Called when a read or write fails.
    fn on_failure(&self, _ctx: &SourceContext, _severity: Severity, _error: &SourceError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &SourceContext, severity: Severity, error: &SourceError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn DataSourceObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn DataSourceObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl DataSourceObserver for CompositeObserver {
    fn on_success(&self, ctx: &SourceContext, stats: SourceStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &SourceContext, severity: Severity, error: &SourceError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &SourceContext, severity: Severity, error: &SourceError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Emits events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl DataSourceObserver for TracingObserver {
    fn on_success(&self, ctx: &SourceContext, stats: SourceStats) {
        tracing::info!(
            operation = %ctx.operation,
            kind = %ctx.kind,
            location = %ctx.location,
            rows = stats.rows,
            columns = stats.columns,
            "source ok"
        );
    }

    fn on_failure(&self, ctx: &SourceContext, severity: Severity, error: &SourceError) {
        tracing::warn!(
            operation = %ctx.operation,
            kind = %ctx.kind,
            location = %ctx.location,
            ?severity,
            %error,
            "source failed"
        );
    }

    fn on_alert(&self, ctx: &SourceContext, severity: Severity, error: &SourceError) {
        tracing::error!(
            operation = %ctx.operation,
            kind = %ctx.kind,
            location = %ctx.location,
            ?severity,
            %error,
            "source alert"
        );
    }
}

/// Appends events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl DataSourceObserver for FileObserver {
    fn on_success(&self, ctx: &SourceContext, stats: SourceStats) {
        self.append_line(&format!(
            "{} ok op={} kind={} location={} rows={} columns={}",
            unix_ts(),
            ctx.operation,
            ctx.kind,
            ctx.location,
            stats.rows,
            stats.columns
        ));
    }

    fn on_failure(&self, ctx: &SourceContext, severity: Severity, error: &SourceError) {
        self.append_line(&format!(
            "{} fail severity={:?} op={} kind={} location={} err={}",
            unix_ts(),
            severity,
            ctx.operation,
            ctx.kind,
            ctx.location,
            error
        ));
    }

    fn on_alert(&self, ctx: &SourceContext, severity: Severity, error: &SourceError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} op={} kind={} location={} err={}",
            unix_ts(),
            severity,
            ctx.operation,
            ctx.kind,
            ctx.location,
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
