//! Discriminator → driver registration.
//!
//! A discriminator is a file extension (`csv`, `json`, `pkl`, `joblib`) or an explicit backend
//! kind (`sql`, `object_store`, `kv`, `queue`, and their aliases). Lookups are exact and
//! case-insensitive; an unknown discriminator is an [`UnsupportedSourceError`], never a
//! fallback.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use crate::error::UnsupportedSourceError;

use super::SourceKind;

static GLOBAL: LazyLock<Arc<SourceRegistry>> = LazyLock::new(|| Arc::new(SourceRegistry::with_builtins()));

/// Built-in registration table.
const BUILTINS: &[(&str, SourceKind)] = &[
    ("csv", SourceKind::Csv),
    ("json", SourceKind::Json),
    ("pkl", SourceKind::Pickle),
    ("pickle", SourceKind::Pickle),
    ("joblib", SourceKind::Joblib),
    ("sql", SourceKind::Sql),
    ("sqlite", SourceKind::Sql),
    ("object_store", SourceKind::ObjectStore),
    ("s3", SourceKind::ObjectStore),
    ("kv", SourceKind::KeyValue),
    ("redis", SourceKind::KeyValue),
    ("queue", SourceKind::Queue),
    ("kafka", SourceKind::Queue),
];

/// Mapping from discriminator to [`SourceKind`].
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    entries: HashMap<String, SourceKind>,
}

impl SourceRegistry {
    /// A registry with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding the built-in registration table.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for (token, kind) in BUILTINS {
            registry.register(token, *kind);
        }
        registry
    }

    /// Process-wide registry of the built-ins, initialized on first use and read-only after.
    pub fn global() -> Arc<SourceRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Map `token` to `kind`, returning the previous mapping if there was one.
    pub fn register(&mut self, token: &str, kind: SourceKind) -> Option<SourceKind> {
        self.entries.insert(token.to_ascii_lowercase(), kind)
    }

    /// Exact, case-insensitive lookup.
    pub fn resolve_by_discriminator(&self, token: &str) -> Result<SourceKind, UnsupportedSourceError> {
        self.entries
            .get(&token.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| UnsupportedSourceError {
                token: token.to_string(),
            })
    }

    /// Resolve by the location's trailing extension.
    ///
    /// A location without an extension is unsupported; the error carries the whole location.
    pub fn resolve_by_location(&self, location: &str) -> Result<SourceKind, UnsupportedSourceError> {
        match Path::new(location).extension().and_then(|e| e.to_str()) {
            Some(ext) => self.resolve_by_discriminator(ext),
            None => Err(UnsupportedSourceError {
                token: location.to_string(),
            }),
        }
    }

    /// Registered discriminators, sorted.
    pub fn discriminators(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }
}
