use rusqlite::{Connection, params};
use serde_json::json;
use tempfile::TempDir;

use syncgate::persist::{
    PersistError, SnapshotRecord, SnapshotStore,
    memory::MemorySnapshotStore,
    persister::StatePersister,
    sqlite::SqliteSnapshotStore,
};

fn record(value: i64, sequence: u64, created_at_ms: u64) -> SnapshotRecord {
    SnapshotRecord {
        snapshot: json!({ "value": value }),
        sequence,
        created_at_ms,
    }
}

#[test]
fn empty_backend_loads_none() {
    let mut persister = StatePersister::new(MemorySnapshotStore::new());
    assert_eq!(persister.load_state().expect("load"), None);
    assert_eq!(persister.sequence(), 0);
}

#[test]
fn save_then_load_round_trips_snapshot() {
    let store = MemorySnapshotStore::new();
    let mut persister = StatePersister::new(store.clone());

    let snapshot = json!({ "value": 7, "tags": ["a", "b"], "nested": { "ok": true } });
    let saved = persister.save_state(snapshot.clone()).expect("save");
    assert_eq!(saved.snapshot, snapshot);

    let mut reader = StatePersister::new(store);
    assert_eq!(reader.load_state().expect("load"), Some(snapshot));
}

#[test]
fn successive_saves_have_strictly_increasing_sequences() {
    let store = MemorySnapshotStore::new();
    let mut persister = StatePersister::new(store.clone());

    let seqs: Vec<u64> = (0..6)
        .map(|i| persister.save_state(json!({ "value": i })).expect("save").sequence)
        .collect();

    assert!(seqs.windows(2).all(|w| w[0] < w[1]), "{seqs:?}");
    assert_eq!(store.len(), 6);
    assert_eq!(persister.sequence(), *seqs.last().expect("last"));
}

#[test]
fn memory_latest_prefers_sequence_then_timestamp_then_newest_row() {
    let mut store = MemorySnapshotStore::new();
    store.append(&record(1, 3, 100)).expect("append");
    store.append(&record(2, 5, 100)).expect("append");
    store.append(&record(3, 2, 900)).expect("append");
    assert_eq!(store.latest().expect("latest"), Some(record(2, 5, 100)));

    store.append(&record(4, 5, 200)).expect("append");
    assert_eq!(store.latest().expect("latest"), Some(record(4, 5, 200)));

    store.append(&record(5, 5, 200)).expect("append");
    assert_eq!(store.latest().expect("latest"), Some(record(5, 5, 200)));
}

#[test]
fn load_raises_sequence_so_new_saves_outrank_loaded_snapshot() {
    let store = MemorySnapshotStore::new();
    let mut first = StatePersister::new(store.clone());
    for i in 0..4 {
        first.save_state(json!({ "value": i })).expect("save");
    }

    let mut second = StatePersister::new(store.clone());
    assert_eq!(second.load_state().expect("load"), Some(json!({ "value": 3 })));
    let saved = second.save_state(json!({ "value": 99 })).expect("save");
    assert_eq!(saved.sequence, 5);

    let mut third = StatePersister::new(store);
    assert_eq!(third.load_state().expect("load"), Some(json!({ "value": 99 })));
}

#[test]
fn saves_never_rewrite_existing_rows() {
    let store = MemorySnapshotStore::new();
    let mut persister = StatePersister::new(store.clone());
    persister.save_state(json!({ "value": 1 })).expect("save");
    let before = store.records();
    persister.save_state(json!({ "value": 2 })).expect("save");
    let after = store.records();

    assert_eq!(after.len(), 2);
    assert_eq!(after[0], before[0]);
}

#[test]
fn sqlite_round_trips_and_survives_reopen() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("state.db");

    let mut persister = StatePersister::new(SqliteSnapshotStore::new(&db_path));
    assert_eq!(persister.load_state().expect("load"), None);
    persister.save_state(json!({ "value": 1 })).expect("save1");
    persister.save_state(json!({ "value": 2 })).expect("save2");
    persister.close().expect("close");

    let mut reopened = SqliteSnapshotStore::open(&db_path).expect("reopen");
    assert_eq!(reopened.count().expect("count"), 2);
    let latest = reopened.latest().expect("latest").expect("row");
    assert_eq!(latest.snapshot, json!({ "value": 2 }));
    assert_eq!(latest.sequence, 2);
}

#[test]
fn sqlite_latest_orders_by_sequence_then_timestamp() {
    let mut store = SqliteSnapshotStore::open_in_memory().expect("open");
    store.append(&record(1, 9, 10)).expect("append");
    store.append(&record(2, 4, 99)).expect("append");
    store.append(&record(3, 9, 20)).expect("append");

    let latest = store.latest().expect("latest").expect("row");
    assert_eq!(latest, record(3, 9, 20));
}

#[test]
fn sqlite_reconnects_lazily_after_close() {
    let tmp = TempDir::new().expect("tmp");
    let mut store = SqliteSnapshotStore::new(tmp.path().join("lazy.db"));
    store.append(&record(1, 1, 1)).expect("append");
    store.close().expect("close");
    store.close().expect("close twice");

    assert_eq!(store.latest().expect("latest"), Some(record(1, 1, 1)));
}

#[test]
fn sqlite_rejects_unknown_envelope_version() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("future.db");
    SqliteSnapshotStore::open(&db_path)
        .expect("init schema")
        .close()
        .expect("close");

    let conn = Connection::open(&db_path).expect("raw open");
    let payload = serde_json::to_vec(&json!({ "format_version": 42, "snapshot": {} })).expect("json");
    conn.execute(
        "INSERT INTO snapshots(sequence, created_at_ms, payload) VALUES (?1, ?2, ?3)",
        params![1i64, 1i64, payload],
    )
    .expect("insert");
    drop(conn);

    let mut persister = StatePersister::new(SqliteSnapshotStore::new(&db_path));
    let err = persister.load_state().expect_err("must reject");
    assert!(matches!(err, PersistError::Message(_)), "{err:?}");
}

#[test]
fn sqlite_connection_failure_is_a_load_failure() {
    let tmp = TempDir::new().expect("tmp");
    let missing_dir = tmp.path().join("no-such-dir").join("state.db");

    let mut persister = StatePersister::new(SqliteSnapshotStore::new(missing_dir));
    let err = persister.load_state().expect_err("unreachable path");
    assert!(matches!(err, PersistError::Unavailable(_)), "{err:?}");
}

#[test]
fn sqlite_drops_a_stale_connection_and_reopens_on_next_connect() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("stale.db");
    let mut store = SqliteSnapshotStore::open(&db_path).expect("open");
    store.append(&record(1, 1, 1)).expect("append");

    let raw = Connection::open(&db_path).expect("raw open");
    raw.execute_batch("DROP TABLE snapshots").expect("drop table");
    drop(raw);

    let err = store.connect().expect_err("stale connection");
    assert!(matches!(err, PersistError::Sqlite(_)), "{err:?}");

    store.connect().expect("fresh connection");
    assert_eq!(store.latest().expect("latest"), None);
    store.append(&record(2, 1, 1)).expect("append after reopen");
    assert_eq!(store.count().expect("count"), 1);
}

#[test]
fn sqlite_refuses_values_outside_integer_range() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("range.db");
    let mut store = SqliteSnapshotStore::open(&db_path).expect("open");

    let err = store.append(&record(1, u64::MAX, 1)).expect_err("sequence too large");
    assert!(matches!(err, PersistError::Message(_)), "{err:?}");
    let err = store.append(&record(1, 1, u64::MAX)).expect_err("timestamp too large");
    assert!(matches!(err, PersistError::Message(_)), "{err:?}");
    assert_eq!(store.count().expect("count"), 0);

    let raw = Connection::open(&db_path).expect("raw open");
    let payload =
        serde_json::to_vec(&json!({ "format_version": 1, "snapshot": {} })).expect("json");
    raw.execute(
        "INSERT INTO snapshots(sequence, created_at_ms, payload) VALUES (?1, ?2, ?3)",
        params![-5i64, 1i64, payload],
    )
    .expect("insert");
    drop(raw);

    let err = store.latest().expect_err("negative sequence");
    assert!(matches!(err, PersistError::Message(_)), "{err:?}");
}

#[test]
fn exhausted_sequence_counter_fails_the_save() {
    let mut store = MemorySnapshotStore::new();
    store.append(&record(1, u64::MAX, 1)).expect("append");

    let mut persister = StatePersister::new(store.clone());
    persister.load_state().expect("load");
    assert_eq!(persister.sequence(), u64::MAX);

    let err = persister.save_state(json!({ "value": 2 })).expect_err("no next sequence");
    assert!(matches!(err, PersistError::Message(_)), "{err:?}");
    assert_eq!(store.len(), 1);
}
