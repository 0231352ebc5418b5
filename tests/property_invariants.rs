use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use syncgate::{
    action::{Control, ControlKind},
    admin::{AdminState, SyncStatus, transition},
    container::Reducer,
    gateway::{
        config::GatewayConfig,
        handle::{Disposition, spawn_gateway},
    },
    persist::{
        SnapshotRecord, SnapshotStore, memory::MemorySnapshotStore, persister::StatePersister,
    },
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Tally {
    total: i64,
    ops: u32,
}

#[derive(Debug, Clone)]
enum TallyAction {
    Add(i64),
    Double,
    Reset,
}

struct TallyReducer;

impl Reducer for TallyReducer {
    type State = Tally;
    type Action = TallyAction;

    fn init(&self) -> Tally {
        Tally::default()
    }

    fn reduce(&self, state: &Tally, action: &TallyAction) -> Tally {
        let total = match action {
            TallyAction::Add(n) => state.total + n,
            TallyAction::Double => state.total * 2,
            TallyAction::Reset => 0,
        };
        Tally {
            total,
            ops: state.ops + 1,
        }
    }
}

fn action_strategy() -> impl Strategy<Value = TallyAction> {
    prop_oneof![
        (-50i64..50).prop_map(TallyAction::Add),
        Just(TallyAction::Double),
        Just(TallyAction::Reset),
    ]
}

fn control_strategy() -> impl Strategy<Value = ControlKind> {
    (0usize..ControlKind::ALL.len()).prop_map(|i| ControlKind::ALL[i])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn accepted_actions_fold_over_hydrated_state(
        seed in -100i64..100,
        actions in prop::collection::vec(action_strategy(), 0..40),
    ) {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let (state, persisted) = rt.block_on(async {
            let mut store = MemorySnapshotStore::new();
            StatePersister::new(store.clone())
                .save_state(json!({ "total": seed, "ops": 0 }))
                .expect("seed");

            let config = GatewayConfig { load_retry_ms: None, ..GatewayConfig::default() };
            let handle = spawn_gateway(TallyReducer, StatePersister::new(store.clone()), config);
            handle.settled().await.expect("settle");

            for action in &actions {
                let out = handle.dispatch_domain(action.clone()).await.expect("dispatch");
                assert_eq!(out.disposition, Disposition::Applied);
            }
            handle.settled().await.expect("settle");
            let state = handle.state().await.expect("state");
            handle.shutdown().await.expect("shutdown");
            (state, store.latest().expect("latest"))
        });

        let reducer = TallyReducer;
        let expected = actions
            .iter()
            .fold(Tally { total: seed, ops: 0 }, |acc, a| reducer.reduce(&acc, a));
        prop_assert_eq!(&state, &expected);

        let persisted = persisted.expect("at least the seed");
        let persisted: Tally = serde_json::from_value(persisted.snapshot).expect("decode");
        prop_assert_eq!(persisted, expected);
    }

    #[test]
    fn status_depends_only_on_last_control_action(
        kinds in prop::collection::vec(control_strategy(), 1..50),
    ) {
        let mut admin = AdminState::new();
        for kind in &kinds {
            let (before, after) = admin.apply(*kind);
            prop_assert_eq!(after, transition(before, *kind));
        }
        let last = *kinds.last().expect("non-empty");
        prop_assert_eq!(admin.status(), transition(SyncStatus::IsEmpty, last));
        prop_assert_ne!(admin.status(), SyncStatus::Computing);
    }

    #[test]
    fn memory_latest_is_max_sequence_then_timestamp(
        rows in prop::collection::vec((0u64..20, 0u64..20), 1..30),
    ) {
        let mut store = MemorySnapshotStore::new();
        for (i, (sequence, created_at_ms)) in rows.iter().enumerate() {
            store
                .append(&SnapshotRecord {
                    snapshot: json!(i),
                    sequence: *sequence,
                    created_at_ms: *created_at_ms,
                })
                .expect("append");
        }
        let latest = store.latest().expect("latest").expect("row");
        let best = rows.iter().copied().max().expect("non-empty");
        prop_assert_eq!((latest.sequence, latest.created_at_ms), best);
        let newest_idx = rows.iter().rposition(|r| *r == best).expect("present");
        prop_assert_eq!(latest.snapshot, json!(newest_idx));
    }
}

#[test]
fn control_actions_expose_their_kind() {
    let loaded: Control<Tally> = Control::Loaded(None);
    assert_eq!(loaded.kind(), ControlKind::Loaded);
    assert_eq!(loaded.kind().to_string(), "@@syncgate/LOADED");
    assert_eq!(SyncStatus::UpToDate.to_string(), "@@syncgate/UP_TO_DATE");
}
