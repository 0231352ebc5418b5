pub mod memory;
pub mod persister;
pub mod sqlite;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Sequence, TimestampMs};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// One append-only row in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub snapshot: serde_json::Value,
    pub sequence: Sequence,
    pub created_at_ms: TimestampMs,
}

/// Backend contract for whole-snapshot storage.
///
/// Calls are blocking; the gateway drives them from the blocking pool.
pub trait SnapshotStore: Send {
    /// Establishes or verifies the connection. Called before every query.
    fn connect(&mut self) -> PersistResult<()> {
        Ok(())
    }
    /// Highest `sequence`, newest `created_at_ms` on ties.
    fn latest(&mut self) -> PersistResult<Option<SnapshotRecord>>;
    fn append(&mut self, record: &SnapshotRecord) -> PersistResult<()>;
    fn close(&mut self) -> PersistResult<()> {
        Ok(())
    }
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Box<T> {
    fn connect(&mut self) -> PersistResult<()> {
        (**self).connect()
    }

    fn latest(&mut self) -> PersistResult<Option<SnapshotRecord>> {
        (**self).latest()
    }

    fn append(&mut self, record: &SnapshotRecord) -> PersistResult<()> {
        (**self).append(record)
    }

    fn close(&mut self) -> PersistResult<()> {
        (**self).close()
    }
}
