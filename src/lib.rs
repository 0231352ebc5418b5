//! Status-gated synchronization between an in-memory state container and a
//! whole-snapshot persistence backend.
//!
//! # Examples
//!
//! The admin state machine on its own:
//! ```
//! use syncgate::{
//!     action::ControlKind,
//!     admin::{AdminState, SyncStatus},
//! };
//!
//! let mut admin = AdminState::new();
//! admin.apply(ControlKind::Load);
//! assert!(!admin.status().accepts_domain_actions());
//! admin.apply(ControlKind::Loaded);
//! assert_eq!(admin.status(), SyncStatus::UpToDate);
//! ```
//!
//! A gateway over a SQLite store:
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use syncgate::{
//!     container::Reducer,
//!     gateway::{config::GatewayConfig, handle::spawn_gateway},
//!     persist::{persister::StatePersister, sqlite::SqliteSnapshotStore},
//! };
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Counter {
//!     value: i64,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = Counter;
//!     type Action = i64;
//!
//!     fn init(&self) -> Counter {
//!         Counter::default()
//!     }
//!
//!     fn reduce(&self, state: &Counter, delta: &i64) -> Counter {
//!         Counter { value: state.value + delta }
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let persister = StatePersister::new(SqliteSnapshotStore::new("state.db"));
//! let handle = spawn_gateway(CounterReducer, persister, GatewayConfig::default());
//! handle.settled().await.expect("hydrate");
//! handle.dispatch_domain(1).await.expect("dispatch");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Action model: domain and control actions.
pub mod action;
/// Admin container and status transition table.
pub mod admin;
/// Primary container and the reducer trait.
pub mod container;
/// Gateway task, handle, config and events.
pub mod gateway;
/// Snapshot persistence contract, adapter and stores.
pub mod persist;
/// Shared primitive aliases.
pub mod types;
