//! Volatile in-process backend.

use super::{RuleBackend, Snapshot, StoreLock};
use crate::MateriaError;

/// Keeps the snapshot in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Snapshot,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RuleBackend for MemoryStore {
    fn read_snapshot(&self) -> Result<Snapshot, MateriaError> {
        Ok(self.snapshot.clone())
    }

    fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), MateriaError> {
        self.snapshot = snapshot.clone();
        Ok(())
    }

    // &mut access already makes the writer exclusive
    fn lock(&self) -> Result<StoreLock, MateriaError> {
        Ok(StoreLock::held_by_handle())
    }
}
