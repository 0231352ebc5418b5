//! Load/save adapter over a [`SnapshotStore`].

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::types::{Sequence, TimestampMs};

use super::{PersistError, PersistResult, SnapshotRecord, SnapshotStore};

/// Translates `load_state`/`save_state` into store calls and owns the
/// per-instance sequence counter.
pub struct StatePersister {
    store: Box<dyn SnapshotStore>,
    sequence: Sequence,
}

impl StatePersister {
    pub fn new(store: impl SnapshotStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            sequence: 0,
        }
    }

    /// Sequence number of the last save issued by this instance, or of the
    /// last loaded record if that was higher.
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    /// Returns the newest snapshot, or `None` when the backend is empty.
    pub fn load_state(&mut self) -> PersistResult<Option<serde_json::Value>> {
        self.store.connect()?;
        let Some(record) = self.store.latest()? else {
            info!("backend holds no snapshot");
            return Ok(None);
        };
        // Later saves must outrank whatever was just loaded.
        self.sequence = self.sequence.max(record.sequence);
        debug!(sequence = record.sequence, created_at_ms = record.created_at_ms, "loaded snapshot");
        Ok(Some(record.snapshot))
    }

    /// Appends `snapshot` under the next sequence and returns it.
    pub fn save_state(&mut self, snapshot: serde_json::Value) -> PersistResult<SnapshotRecord> {
        self.store.connect()?;
        let sequence = self
            .sequence
            .checked_add(1)
            .ok_or_else(|| PersistError::Message("sequence counter exhausted".to_string()))?;
        let record = SnapshotRecord {
            snapshot,
            sequence,
            created_at_ms: now_ms()?,
        };
        self.store.append(&record)?;
        self.sequence = record.sequence;
        debug!(sequence = record.sequence, "saved snapshot");
        Ok(record)
    }

    pub fn close(&mut self) -> PersistResult<()> {
        self.store.close()
    }
}

pub(crate) fn now_ms() -> PersistResult<TimestampMs> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    TimestampMs::try_from(millis)
        .map_err(|_| PersistError::Message(format!("clock out of range: {millis} ms")))
}
