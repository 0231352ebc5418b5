//! SQLite-backed append-only snapshot table.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{Sequence, TimestampMs};

use super::{PersistError, PersistResult, SnapshotRecord, SnapshotStore};

/// Version number for serialized [`SnapshotEnvelope`] payloads.
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sequence INTEGER NOT NULL,
    created_at_ms INTEGER NOT NULL,
    payload BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS snapshots_latest
    ON snapshots(sequence DESC, created_at_ms DESC);
";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    format_version: u16,
    snapshot: serde_json::Value,
}

enum Target {
    File(PathBuf),
    Memory,
}

/// SQLite implementation of [`SnapshotStore`].
///
/// The connection is opened lazily by [`SnapshotStore::connect`] and dropped
/// by [`SnapshotStore::close`].
pub struct SqliteSnapshotStore {
    target: Target,
    conn: Option<Connection>,
}

impl SqliteSnapshotStore {
    /// Store backed by the database file at `path`. Nothing is opened yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            target: Target::File(path.as_ref().to_path_buf()),
            conn: None,
        }
    }

    /// Opens the file at `path` immediately, surfacing connection errors early.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let mut store = Self::new(path);
        store.connect()?;
        Ok(store)
    }

    /// Opens a private in-memory database. Its contents vanish on `close`.
    pub fn open_in_memory() -> PersistResult<Self> {
        let mut store = Self {
            target: Target::Memory,
            conn: None,
        };
        store.connect()?;
        Ok(store)
    }

    /// Number of stored rows.
    pub fn count(&mut self) -> PersistResult<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        usize::try_from(n)
            .map_err(|_| PersistError::Message(format!("row count out of range: {n}")))
    }

    fn init_connection(conn: &Connection) -> PersistResult<()> {
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(())
    }

    fn conn(&mut self) -> PersistResult<&Connection> {
        self.connect()?;
        self.conn
            .as_ref()
            .ok_or_else(|| PersistError::Unavailable("sqlite connection not open".to_string()))
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn connect(&mut self) -> PersistResult<()> {
        if let Some(conn) = &self.conn {
            let alive = conn
                .query_row("SELECT 1 FROM snapshots LIMIT 1", [], |_| Ok(()))
                .optional();
            match alive {
                Ok(_) => return Ok(()),
                Err(err) => {
                    warn!(error = %err, "sqlite connection unusable; dropping it");
                    self.conn = None;
                    return Err(err.into());
                }
            }
        }

        let conn = match &self.target {
            Target::File(path) => {
                info!(path = %path.display(), "opening sqlite snapshot store");
                Connection::open(path)
            }
            Target::Memory => Connection::open_in_memory(),
        }
        .map_err(|err| PersistError::Unavailable(err.to_string()))?;
        Self::init_connection(&conn)?;
        self.conn = Some(conn);
        Ok(())
    }

    fn latest(&mut self) -> PersistResult<Option<SnapshotRecord>> {
        let conn = self.conn()?;
        let row: Option<(i64, i64, Vec<u8>)> = conn
            .query_row(
                "SELECT sequence, created_at_ms, payload FROM snapshots \
                 ORDER BY sequence DESC, created_at_ms DESC, id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((sequence, created_at_ms, payload)) = row else {
            return Ok(None);
        };

        let env: SnapshotEnvelope = serde_json::from_slice(&payload)?;
        if env.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(PersistError::Message(format!(
                "unsupported snapshot format version: {}",
                env.format_version
            )));
        }

        Ok(Some(SnapshotRecord {
            snapshot: env.snapshot,
            sequence: from_column::<Sequence>("sequence", sequence)?,
            created_at_ms: from_column::<TimestampMs>("created_at_ms", created_at_ms)?,
        }))
    }

    fn append(&mut self, record: &SnapshotRecord) -> PersistResult<()> {
        let env = SnapshotEnvelope {
            format_version: SNAPSHOT_FORMAT_VERSION,
            snapshot: record.snapshot.clone(),
        };
        let sequence = to_column("sequence", record.sequence)?;
        let created_at_ms = to_column("created_at_ms", record.created_at_ms)?;
        let payload = serde_json::to_vec(&env)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO snapshots(sequence, created_at_ms, payload) VALUES (?1, ?2, ?3)",
            params![sequence, created_at_ms, payload],
        )?;
        Ok(())
    }

    fn close(&mut self) -> PersistResult<()> {
        if let Some(conn) = self.conn.take() {
            debug!("closing sqlite snapshot store");
            conn.close().map_err(|(_, err)| PersistError::Sqlite(err))?;
        }
        Ok(())
    }
}

fn to_column(name: &str, value: u64) -> PersistResult<i64> {
    i64::try_from(value).map_err(|_| {
        PersistError::Message(format!("{name} {value} does not fit an sqlite integer"))
    })
}

fn from_column<T: TryFrom<i64>>(name: &str, value: i64) -> PersistResult<T> {
    T::try_from(value)
        .map_err(|_| PersistError::Message(format!("stored {name} is negative: {value}")))
}
