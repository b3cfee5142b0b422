use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the tick loop
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period between ticks (milliseconds)
    pub tick_interval_ms: u64,

    /// Minimum time between successful batch flushes (seconds)
    pub flush_interval_seconds: i64,

    /// Minimum time between repeat alerts at unchanged severity (seconds)
    pub throttle_window_seconds: i64,

    /// Every Nth tick forces an abnormal heart rate
    pub forced_abnormal_period: u64,

    /// Upper bound on roster reads and flushes (milliseconds)
    pub operation_timeout_ms: u64,

    /// Fixed RNG seed for reproducible runs (entropy when absent)
    pub seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            flush_interval_seconds: 60,
            throttle_window_seconds: 60,
            forced_abnormal_period: 30,
            operation_timeout_ms: 5000,
            seed: None,
        }
    }
}

impl SchedulerConfig {
    /// Flush interval as a duration, rejecting values chrono cannot represent
    pub fn flush_interval(&self) -> Result<chrono::Duration> {
        seconds("flush_interval_seconds", self.flush_interval_seconds)
    }

    /// Throttle window as a duration, rejecting values chrono cannot represent
    pub fn throttle_window(&self) -> Result<chrono::Duration> {
        seconds("throttle_window_seconds", self.throttle_window_seconds)
    }
}

fn seconds(field: &str, value: i64) -> Result<chrono::Duration> {
    chrono::Duration::try_seconds(value)
        .ok_or_else(|| anyhow!("scheduler.{} = {} is out of range", field, value))
}
