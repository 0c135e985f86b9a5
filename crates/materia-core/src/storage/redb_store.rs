//! # redb-backed Rule Storage
//!
//! An embedded key-value alternative to the JSON directory.
//!
//! - Rules keyed by collection position, values are header-prefixed postcard
//!   blobs
//! - The three derived documents stored as single keyed blobs
//! - A full snapshot is replaced in one ACID write transaction
//! - redb holds an exclusive lock on the file for the lifetime of the handle,
//!   which serves as the writer lock
//!
//! Keying by position keeps load order equal to collection order whatever
//! shape the rule ids have.

use super::{RuleBackend, Snapshot, StoreLock, load_or_default};
use crate::formats::{blob_from_bytes, blob_to_bytes};
use crate::{MateriaError, Rule};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for rules: position -> blob(Rule)
const RULES: TableDefinition<u64, &[u8]> = TableDefinition::new("rules");

/// Table for derived documents: name -> blob
const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

const METADATA_KEY: &str = "metadata";
const INDEX_KEY: &str = "index";
const VALIDATION_KEY: &str = "validation";

fn storage_err(e: impl std::fmt::Display) -> MateriaError {
    MateriaError::Storage(e.to_string())
}

/// Rule store backed by a redb database file.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MateriaError> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| MateriaError::Io(e.to_string()))?;
        }

        let db = Database::create(path.as_ref()).map_err(|e| match e {
            redb::DatabaseError::DatabaseAlreadyOpen => {
                MateriaError::Locked(path.as_ref().to_path_buf())
            }
            other => storage_err(other),
        })?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(RULES).map_err(storage_err)?;
            let _ = write_txn.open_table(DOCUMENTS).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        Ok(Self { db })
    }

    /// Number of stored rules.
    pub fn rule_count(&self) -> Result<u64, MateriaError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(RULES).map_err(storage_err)?;
        table.len().map_err(storage_err)
    }

    fn read_rules(&self) -> Result<Vec<Rule>, MateriaError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(RULES).map_err(storage_err)?;

        let mut rules = Vec::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            match blob_from_bytes::<Rule>(value.value()) {
                Ok(rule) => rules.push(rule),
                Err(e) => tracing::warn!(position = key.value(), error = %e, "skipping undecodable rule"),
            }
        }
        Ok(rules)
    }

    fn try_read_document<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, MateriaError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(DOCUMENTS).map_err(storage_err)?;
        match table.get(key).map_err(storage_err)? {
            Some(bytes) => blob_from_bytes(bytes.value()),
            None => Ok(T::default()),
        }
    }

    fn read_document<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        load_or_default(self.try_read_document(key), key)
    }
}

impl RuleBackend for RedbStore {
    fn read_snapshot(&self) -> Result<Snapshot, MateriaError> {
        Ok(Snapshot {
            rules: self.read_rules()?,
            metadata: self.read_document(METADATA_KEY),
            index: self.read_document(INDEX_KEY),
            validation: self.read_document(VALIDATION_KEY),
        })
    }

    fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), MateriaError> {
        // Encode everything before the transaction opens
        let encoded = snapshot
            .rules
            .iter()
            .map(blob_to_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        let documents = [
            (METADATA_KEY, blob_to_bytes(&snapshot.metadata)?),
            (INDEX_KEY, blob_to_bytes(&snapshot.index)?),
            (VALIDATION_KEY, blob_to_bytes(&snapshot.validation)?),
        ];

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut rules_table = write_txn.open_table(RULES).map_err(storage_err)?;
            rules_table.retain(|_, _| false).map_err(storage_err)?;
            for (position, bytes) in (0u64..).zip(&encoded) {
                rules_table
                    .insert(position, bytes.as_slice())
                    .map_err(storage_err)?;
            }

            let mut documents_table = write_txn.open_table(DOCUMENTS).map_err(storage_err)?;
            for (key, bytes) in &documents {
                documents_table
                    .insert(*key, bytes.as_slice())
                    .map_err(storage_err)?;
            }
        }
        write_txn.commit().map_err(storage_err)?;

        tracing::debug!(rules = snapshot.rules.len(), "redb snapshot committed");
        Ok(())
    }

    fn lock(&self) -> Result<StoreLock, MateriaError> {
        Ok(StoreLock::held_by_handle())
    }
}

// =============================================================================
// TESTS
// =============================================================================
