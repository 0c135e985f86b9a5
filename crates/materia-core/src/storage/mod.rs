//! # Storage Module
//!
//! The persistence seam behind `RuleStore`.
//!
//! Every backend stores the same `Snapshot`: the ordered rules plus the three
//! derived documents. The store always reads the whole snapshot, recomputes,
//! and writes the whole snapshot back while holding the backend's lock.
//!
//! ## Backends
//!
//! - `JsonDirStore`: four pretty JSON documents in a directory, atomic
//!   per-document replacement, lock file for exclusive writers
//! - `RedbStore`: embedded redb database, one ACID transaction per write
//! - `MemoryStore`: volatile, for tests and ephemeral servers

mod json_dir;
mod memory;
mod redb_store;

pub use json_dir::{JsonDirStore, LOCK_FILE};
pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::cross_validation::ValidationRecords;
use crate::index::RuleIndex;
use crate::metadata::MetadataMap;
use crate::{MateriaError, Rule};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// The complete persisted state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub rules: Vec<Rule>,
    pub metadata: MetadataMap,
    pub index: RuleIndex,
    pub validation: ValidationRecords,
}

// =============================================================================
// BACKEND TRAIT
// =============================================================================

/// A place the rule store can persist its snapshot to.
pub trait RuleBackend {
    /// Read the full state.
    ///
    /// Missing or corrupt documents load as empty defaults with a warning;
    /// only an unusable backend is an error.
    fn read_snapshot(&self) -> Result<Snapshot, MateriaError>;

    /// Replace the full state.
    fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), MateriaError>;

    /// Acquire exclusive write access for a read-compute-write cycle.
    ///
    /// The returned guard releases the lock when dropped.
    fn lock(&self) -> Result<StoreLock, MateriaError>;
}

/// RAII guard for a backend's writer lock.
///
/// File-based locks are removed on drop; backends whose lock is held by the
/// open handle itself return an empty guard.
#[derive(Debug)]
pub struct StoreLock {
    path: Option<PathBuf>,
}

impl StoreLock {
    pub(crate) fn held_by_handle() -> Self {
        Self { path: None }
    }

    pub(crate) fn file(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Some(path) = self.path.take()
            && let Err(e) = std::fs::remove_file(&path)
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to release store lock");
        }
    }
}

/// Log a load failure and fall back to the empty default.
pub(crate) fn load_or_default<T: Default>(result: Result<T, MateriaError>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(document = context, error = %e, "unreadable document, using empty default");
            T::default()
        }
    }
}

// =============================================================================
// BACKEND SELECTION
// =============================================================================

/// Which backend a store is opened with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Json,
    Redb,
    Memory,
}

impl BackendKind {
    /// Parse a backend name.
    pub fn parse(raw: &str) -> Result<Self, MateriaError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            other => Err(MateriaError::InvalidConfig(format!(
                "unknown storage backend '{}' (expected json, redb or memory)",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Redb => "redb",
            Self::Memory => "memory",
        })
    }
}

/// Storage backend of a `RuleStore`.
#[derive(Debug)]
pub enum StorageBackend {
    /// Volatile in-process storage.
    Memory(MemoryStore),
    /// Directory of JSON documents.
    JsonDir(JsonDirStore),
    /// Embedded redb database.
    Redb(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::Memory(MemoryStore::new())
    }
}

impl StorageBackend {
    /// Open a backend of `kind` at `path`.
    ///
    /// `path` is a directory for `Json` and a database file for `Redb`; it is
    /// ignored for `Memory`. `backup` only affects `Json`.
    pub fn open(kind: BackendKind, path: &Path, backup: bool) -> Result<Self, MateriaError> {
        Ok(match kind {
            BackendKind::Json => Self::JsonDir(JsonDirStore::open(path)?.with_backup(backup)),
            BackendKind::Redb => Self::Redb(RedbStore::open(path)?),
            BackendKind::Memory => Self::Memory(MemoryStore::new()),
        })
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Memory(_) => BackendKind::Memory,
            Self::JsonDir(_) => BackendKind::Json,
            Self::Redb(_) => BackendKind::Redb,
        }
    }
}

impl RuleBackend for StorageBackend {
    fn read_snapshot(&self) -> Result<Snapshot, MateriaError> {
        match self {
            Self::Memory(store) => store.read_snapshot(),
            Self::JsonDir(store) => store.read_snapshot(),
            Self::Redb(store) => store.read_snapshot(),
        }
    }

    fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), MateriaError> {
        match self {
            Self::Memory(store) => store.write_snapshot(snapshot),
            Self::JsonDir(store) => store.write_snapshot(snapshot),
            Self::Redb(store) => store.write_snapshot(snapshot),
        }
    }

    fn lock(&self) -> Result<StoreLock, MateriaError> {
        match self {
            Self::Memory(store) => store.lock(),
            Self::JsonDir(store) => store.lock(),
            Self::Redb(store) => store.lock(),
        }
    }
}
