//! Gateway event stream payloads.

use crate::{
    action::{ActionKind, ControlKind},
    admin::SyncStatus,
    types::Sequence,
};

/// Events emitted from the gateway loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Emitted for every dispatch, including ones that leave the status unchanged.
    Transition {
        /// Kind of the dispatched action.
        action: ActionKind,
        /// Status before the dispatch.
        before: SyncStatus,
        /// Status after the dispatch.
        after: SyncStatus,
    },
    /// A domain action mutated the primary container.
    Applied,
    /// A domain action arrived while the gateway was not writable and was lost.
    Dropped {
        /// Status that caused the drop.
        status: SyncStatus,
    },
    /// A control action was refused by a guard.
    Ignored {
        /// Refused action.
        kind: ControlKind,
        /// Status at the time.
        status: SyncStatus,
    },
    /// A reserved control action that has no backend effect.
    Unsupported {
        /// The reserved action.
        kind: ControlKind,
    },
    /// Hydration finished.
    Loaded {
        /// Whether the backend held a snapshot.
        found: bool,
    },
    /// Hydration failed; the status went back to `IsEmpty`.
    LoadFailed {
        /// Rendered backend error.
        error: String,
    },
    /// A snapshot was appended.
    Saved {
        /// Sequence assigned to the record.
        sequence: Sequence,
    },
    /// A save failed; the status went back to `UpToDate`.
    SaveFailed {
        /// Rendered backend error.
        error: String,
    },
    /// A save was requested while one was in flight and will follow it.
    SaveCoalesced,
}
