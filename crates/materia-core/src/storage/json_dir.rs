//! # JSON Directory Backend
//!
//! The canonical on-disk format: four pretty-printed JSON documents in one
//! directory.
//!
//! - Each document is replaced atomically (temp file in the same directory,
//!   then rename). The four documents are not replaced as one unit.
//! - Writers are serialized by a lock file created with `create_new`.
//! - With backups enabled, the previous version of each document is copied to
//!   `<name>.backup.json` before it is overwritten.

use super::{RuleBackend, Snapshot, StoreLock, load_or_default};
use crate::formats::{
    INDEX_DOCUMENT, METADATA_DOCUMENT, RULES_DOCUMENT, VALIDATION_DOCUMENT, document_from_json,
    document_to_json, rules_from_json,
};
use crate::MateriaError;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Name of the writer lock file inside the store directory.
pub const LOCK_FILE: &str = ".materia.lock";

/// Directory of JSON documents.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
    backup: bool,
}

impl JsonDirStore {
    /// Open (creating if needed) a store directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, MateriaError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| MateriaError::Io(e.to_string()))?;
        Ok(Self { dir, backup: false })
    }

    /// Enable or disable `.backup.json` copies.
    #[must_use]
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a document inside the store directory.
    #[must_use]
    pub fn document_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Read a document's bytes; `None` when it does not exist.
    fn read_document(&self, name: &str) -> Result<Option<Vec<u8>>, MateriaError> {
        match fs::read(self.document_path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MateriaError::Io(format!("{}: {}", name, e))),
        }
    }

    fn load_document<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let result = self
            .read_document(name)
            .and_then(|bytes| bytes.map(|b| document_from_json(&b)).transpose())
            .map(Option::unwrap_or_default);
        load_or_default(result, name)
    }

    /// Atomically replace one document.
    fn write_document(&self, name: &str, bytes: &[u8]) -> Result<(), MateriaError> {
        let target = self.document_path(name);

        if self.backup && target.exists() {
            let backup = target.with_extension("backup.json");
            fs::copy(&target, &backup).map_err(|e| MateriaError::Io(e.to_string()))?;
        }

        let mut tmp =
            NamedTempFile::new_in(&self.dir).map_err(|e| MateriaError::Io(e.to_string()))?;
        tmp.write_all(bytes)
            .map_err(|e| MateriaError::Io(e.to_string()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| MateriaError::Io(e.to_string()))?;
        tmp.persist(&target)
            .map_err(|e| MateriaError::Io(format!("{}: {}", name, e.error)))?;
        Ok(())
    }
}

impl RuleBackend for JsonDirStore {
    fn read_snapshot(&self) -> Result<Snapshot, MateriaError> {
        let rules = self
            .read_document(RULES_DOCUMENT)
            .and_then(|bytes| bytes.map(|b| rules_from_json(&b)).transpose())
            .map(Option::unwrap_or_default);

        Ok(Snapshot {
            rules: load_or_default(rules, RULES_DOCUMENT),
            metadata: self.load_document(METADATA_DOCUMENT),
            index: self.load_document(INDEX_DOCUMENT),
            validation: self.load_document(VALIDATION_DOCUMENT),
        })
    }

    fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), MateriaError> {
        self.write_document(RULES_DOCUMENT, &document_to_json(&snapshot.rules)?)?;
        self.write_document(METADATA_DOCUMENT, &document_to_json(&snapshot.metadata)?)?;
        self.write_document(INDEX_DOCUMENT, &document_to_json(&snapshot.index)?)?;
        self.write_document(VALIDATION_DOCUMENT, &document_to_json(&snapshot.validation)?)?;
        tracing::debug!(dir = %self.dir.display(), rules = snapshot.rules.len(), "snapshot written");
        Ok(())
    }

    fn lock(&self) -> Result<StoreLock, MateriaError> {
        let path = self.dir.join(LOCK_FILE);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                // Holder pid, for whoever finds a stale lock
                let _ = writeln!(file, "{}", std::process::id());
                Ok(StoreLock::file(path))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(MateriaError::Locked(path)),
            Err(e) => Err(MateriaError::Io(e.to_string())),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
