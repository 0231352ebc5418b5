//! Shared primitive aliases.

/// Per-persister monotonic save sequence number.
pub type Sequence = u64;
/// Wall-clock timestamp in milliseconds since the Unix epoch.
pub type TimestampMs = u64;
