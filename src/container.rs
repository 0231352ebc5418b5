//! Primary container and the domain transition trait.

use std::fmt::Debug;

use serde::{Serialize, de::DeserializeOwned};

/// Pure domain transition function.
///
/// `reduce` must be deterministic: the gateway relies on folding accepted
/// actions over the last hydrated state to reproduce the in-memory state.
pub trait Reducer: Send + 'static {
    /// Full domain state; persisted whole on every save.
    type State: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Domain action type.
    type Action: Clone + Debug + Send + 'static;

    /// Zero state used before hydration and when the backend is empty.
    fn init(&self) -> Self::State;

    /// Applies one domain action.
    fn reduce(&self, state: &Self::State, action: &Self::Action) -> Self::State;

    /// Rebuilds state from a loaded snapshot. Override to validate or migrate.
    fn rehydrate(&self, snapshot: Self::State) -> Self::State {
        snapshot
    }
}

/// Owner of the domain state. Only the gateway task mutates it.
#[derive(Debug)]
pub struct Container<R: Reducer> {
    reducer: R,
    state: R::State,
}

impl<R: Reducer> Container<R> {
    /// Creates a container at the reducer's zero state.
    pub fn new(reducer: R) -> Self {
        let state = reducer.init();
        Self { reducer, state }
    }

    /// Current state.
    pub fn state(&self) -> &R::State {
        &self.state
    }

    /// Applies a domain action and returns the new state.
    pub fn apply(&mut self, action: &R::Action) -> &R::State {
        self.state = self.reducer.reduce(&self.state, action);
        &self.state
    }

    /// Replaces the state wholesale from a loaded snapshot, or resets to zero
    /// when the backend held nothing.
    pub fn hydrate(&mut self, snapshot: Option<R::State>) -> &R::State {
        self.state = match snapshot {
            Some(snapshot) => self.reducer.rehydrate(snapshot),
            None => self.reducer.init(),
        };
        &self.state
    }
}
