//! Admin container: the synchronization status and its transition table.
//!
//! The transition function is pure. It never performs I/O; the gateway
//! decides what side effects accompany each transition.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::ControlKind;

/// Synchronization phase of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SyncStatus {
    /// No state has been hydrated yet, or the last load failed.
    #[default]
    IsEmpty,
    /// A load is in flight.
    Loading,
    /// Reserved: a create is in progress.
    Creating,
    /// A save is in flight.
    Updating,
    /// Reserved: a delete is in progress.
    Deleting,
    /// Quiescent; the primary container matches the last hydrate or save.
    UpToDate,
    /// Reserved, never entered.
    Computing,
}

impl SyncStatus {
    /// Every status, in declaration order.
    pub const ALL: [SyncStatus; 7] = [
        SyncStatus::IsEmpty,
        SyncStatus::Loading,
        SyncStatus::Creating,
        SyncStatus::Updating,
        SyncStatus::Deleting,
        SyncStatus::UpToDate,
        SyncStatus::Computing,
    ];

    /// Whether a domain action may mutate the primary container in this phase.
    pub fn accepts_domain_actions(self) -> bool {
        !matches!(
            self,
            Self::Creating | Self::Loading | Self::Deleting | Self::IsEmpty
        )
    }

    /// Stable wire-style name, e.g. `@@syncgate/UP_TO_DATE`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IsEmpty => "@@syncgate/IS_EMPTY",
            Self::Loading => "@@syncgate/LOADING",
            Self::Creating => "@@syncgate/CREATING",
            Self::Updating => "@@syncgate/UPDATING",
            Self::Deleting => "@@syncgate/DELETING",
            Self::UpToDate => "@@syncgate/UP_TO_DATE",
            Self::Computing => "@@syncgate/COMPUTING",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Next status after `kind` is applied. Total over all pairs; the current
/// status never influences the result.
pub fn transition(_current: SyncStatus, kind: ControlKind) -> SyncStatus {
    match kind {
        ControlKind::Create => SyncStatus::Creating,
        ControlKind::Load => SyncStatus::Loading,
        ControlKind::Update => SyncStatus::Updating,
        ControlKind::Delete => SyncStatus::Deleting,
        ControlKind::Created | ControlKind::Loaded | ControlKind::Updated => SyncStatus::UpToDate,
        ControlKind::Deleted | ControlKind::LoadFailed => SyncStatus::IsEmpty,
        ControlKind::UpdateFailed => SyncStatus::UpToDate,
    }
}

/// Holder for the single status value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminState {
    status: SyncStatus,
}

impl AdminState {
    /// Starts at [`SyncStatus::IsEmpty`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Applies `kind` and returns the `(before, after)` pair.
    pub fn apply(&mut self, kind: ControlKind) -> (SyncStatus, SyncStatus) {
        let before = self.status;
        self.status = transition(before, kind);
        (before, self.status)
    }
}
