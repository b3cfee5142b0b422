use serde::{Deserialize, Serialize};

/// Configuration for snapshot broadcasting
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Topic snapshots are published under on external sinks
    pub topic: String,

    /// Snapshots waiting for external delivery before new ones are dropped
    pub queue_capacity: usize,

    /// Per-subscriber backlog for in-process subscribers (WebSocket clients)
    pub channel_capacity: usize,

    /// Per-sink publish timeout (milliseconds)
    pub publish_timeout_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            topic: "vitals.snapshots".to_string(),
            queue_capacity: 1024,
            channel_capacity: 1000,
            publish_timeout_ms: 2000,
        }
    }
}
