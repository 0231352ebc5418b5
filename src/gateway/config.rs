use std::time::Duration;

use serde::Deserialize;

/// Tunables for [`super::handle::spawn_gateway`].
///
/// Deserializes from JSON with every field optional; durations are in
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Upper bound on one `load_state` call.
    pub load_timeout_ms: u64,
    /// Upper bound on one `save_state` call.
    pub save_timeout_ms: u64,
    /// Delay before re-issuing `Load` after a failed load. `None` disables retry.
    pub load_retry_ms: Option<u64>,
    /// Capacity of the inbound command channel.
    pub command_queue_bound: usize,
    /// Capacity of the broadcast event channel.
    pub event_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: 10_000,
            save_timeout_ms: 10_000,
            load_retry_ms: Some(5_000),
            command_queue_bound: 256,
            event_capacity: 1024,
        }
    }
}

impl GatewayConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.save_timeout_ms)
    }

    pub fn load_retry(&self) -> Option<Duration> {
        self.load_retry_ms.map(Duration::from_millis)
    }
}
