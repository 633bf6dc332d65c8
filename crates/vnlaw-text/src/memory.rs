use std::sync::RwLock;

use vnlaw_core::error::{Error, Result};
use vnlaw_core::traits::TextBackend;
use vnlaw_core::types::RetrievableUnit;

/// Insertion-ordered in-memory store with exact substring matching.
#[derive(Default)]
pub struct MemoryTextBackend {
    units: RwLock<Vec<RetrievableUnit>>,
}

impl MemoryTextBackend {
    pub fn new() -> Self { Self::default() }

    pub fn with_units(units: Vec<RetrievableUnit>) -> Self {
        Self { units: RwLock::new(units) }
    }

    pub fn len(&self) -> usize { self.units.read().map(|u| u.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<RetrievableUnit>>> {
        self.units.read().map_err(|_| Error::Operation("memory backend lock poisoned".into()))
    }
}

impl TextBackend for MemoryTextBackend {
    fn index(&self, units: &[RetrievableUnit]) -> Result<()> {
        let mut store = self.units.write().map_err(|_| Error::Operation("memory backend lock poisoned".into()))?;
        for unit in units {
            // re-indexing moves the unit to the most recent position
            store.retain(|u| u.id != unit.id);
            store.push(unit.clone());
        }
        Ok(())
    }

    fn contains(&self, needle: &str, limit: usize) -> Result<Vec<RetrievableUnit>> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.read()?.iter().filter(|u| u.contains_folded(&needle)).take(limit).cloned().collect())
    }

    fn most_recent(&self, limit: usize) -> Result<Vec<RetrievableUnit>> {
        Ok(self.read()?.iter().rev().take(limit).cloned().collect())
    }

    fn first(&self, limit: usize) -> Result<Vec<RetrievableUnit>> {
        Ok(self.read()?.iter().take(limit).cloned().collect())
    }
}
