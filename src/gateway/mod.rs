//! Single-writer gateway task, its handle, configuration and event stream.

/// Gateway tunables.
pub mod config;
/// Event stream types emitted by the gateway.
pub mod events;
/// Handle and dispatch loop implementation.
pub mod handle;
