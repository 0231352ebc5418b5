//! In-process snapshot store. Clones share the same rows.

use std::sync::{Arc, Mutex};

use super::{PersistError, PersistResult, SnapshotRecord, SnapshotStore};

#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    rows: Arc<Mutex<Vec<SnapshotRecord>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored row, in insertion order.
    pub fn records(&self) -> Vec<SnapshotRecord> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn latest(&mut self) -> PersistResult<Option<SnapshotRecord>> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| PersistError::Message("memory store poisoned".to_string()))?;
        // max_by keeps the last maximum, so equal keys resolve to the newest row.
        Ok(rows
            .iter()
            .max_by_key(|r| (r.sequence, r.created_at_ms))
            .cloned())
    }

    fn append(&mut self, record: &SnapshotRecord) -> PersistResult<()> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| PersistError::Message("memory store poisoned".to_string()))?;
        rows.push(record.clone());
        Ok(())
    }
}
