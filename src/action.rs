//! Action model routed through the gateway.

use std::fmt;

/// Tagged action accepted by [`crate::gateway::handle::GatewayHandle::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<S, A> {
    /// Domain action, interpreted only by the reducer.
    Domain(A),
    /// Control action, interpreted only by the gateway and admin state machine.
    Control(Control<S>),
}

impl<S, A> Action<S, A> {
    /// Diagnostic kind of this action.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Domain(_) => ActionKind::Domain,
            Self::Control(control) => ActionKind::Control(control.kind()),
        }
    }
}

impl<S, A> From<Control<S>> for Action<S, A> {
    fn from(value: Control<S>) -> Self {
        Self::Control(value)
    }
}

/// Closed set of synchronization control actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control<S> {
    /// Reserved: create the backing record.
    Create,
    /// Reserved: backing record was created.
    Created,
    /// Hydrate the primary container from the backend.
    Load,
    /// Load finished; `None` means the backend held no snapshot.
    Loaded(Option<S>),
    /// Persist the current primary state.
    Update,
    /// Save finished.
    Updated,
    /// Reserved: delete the backing record.
    Delete,
    /// Reserved: backing record was deleted.
    Deleted,
    /// Load failed or timed out. Raised by the gateway itself; ignored when
    /// dispatched through a handle.
    LoadFailed(String),
    /// Save failed or timed out. Raised by the gateway itself; ignored when
    /// dispatched through a handle.
    UpdateFailed(String),
}

impl<S> Control<S> {
    /// Payload-free discriminant.
    pub fn kind(&self) -> ControlKind {
        match self {
            Self::Create => ControlKind::Create,
            Self::Created => ControlKind::Created,
            Self::Load => ControlKind::Load,
            Self::Loaded(_) => ControlKind::Loaded,
            Self::Update => ControlKind::Update,
            Self::Updated => ControlKind::Updated,
            Self::Delete => ControlKind::Delete,
            Self::Deleted => ControlKind::Deleted,
            Self::LoadFailed(_) => ControlKind::LoadFailed,
            Self::UpdateFailed(_) => ControlKind::UpdateFailed,
        }
    }
}

/// Discriminant of [`Control`], used by the admin state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// See [`Control::Create`].
    Create,
    /// See [`Control::Created`].
    Created,
    /// See [`Control::Load`].
    Load,
    /// See [`Control::Loaded`].
    Loaded,
    /// See [`Control::Update`].
    Update,
    /// See [`Control::Updated`].
    Updated,
    /// See [`Control::Delete`].
    Delete,
    /// See [`Control::Deleted`].
    Deleted,
    /// See [`Control::LoadFailed`].
    LoadFailed,
    /// See [`Control::UpdateFailed`].
    UpdateFailed,
}

impl ControlKind {
    /// Every control kind, in declaration order.
    pub const ALL: [ControlKind; 10] = [
        ControlKind::Create,
        ControlKind::Created,
        ControlKind::Load,
        ControlKind::Loaded,
        ControlKind::Update,
        ControlKind::Updated,
        ControlKind::Delete,
        ControlKind::Deleted,
        ControlKind::LoadFailed,
        ControlKind::UpdateFailed,
    ];

    /// Stable wire-style name, e.g. `@@syncgate/LOADED`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "@@syncgate/CREATE",
            Self::Created => "@@syncgate/CREATED",
            Self::Load => "@@syncgate/LOAD",
            Self::Loaded => "@@syncgate/LOADED",
            Self::Update => "@@syncgate/UPDATE",
            Self::Updated => "@@syncgate/UPDATED",
            Self::Delete => "@@syncgate/DELETE",
            Self::Deleted => "@@syncgate/DELETED",
            Self::LoadFailed => "@@syncgate/LOAD_FAILED",
            Self::UpdateFailed => "@@syncgate/UPDATE_FAILED",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic kind of any action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// A domain action.
    Domain,
    /// A control action.
    Control(ControlKind),
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain => f.write_str("domain"),
            Self::Control(kind) => kind.fmt(f),
        }
    }
}
