use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

// Re-export section config types owned by their modules
pub use crate::broadcast::BroadcastConfig;
pub use crate::nats::NatsConfig;
pub use crate::scheduler::SchedulerConfig;

/// Complete VitalWatch configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VitalWatchConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("vitalwatch.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Status API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Alerts returned by the dashboard alert feed when no limit is given
    #[serde(default = "default_recent_alerts_limit")]
    pub recent_alerts_limit: usize,
}

fn default_api_enabled() -> bool {
    true
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_recent_alerts_limit() -> usize {
    50
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            bind_addr: default_bind_addr(),
            recent_alerts_limit: default_recent_alerts_limit(),
        }
    }
}

impl VitalWatchConfig {
    /// Reject values that parse but cannot drive the scheduler
    pub fn validate(&self) -> Result<()> {
        self.scheduler.flush_interval()?;
        self.scheduler.throttle_window()?;
        Ok(())
    }

    /// Apply environment overrides on top of file/default values.
    ///
    /// Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("VITALWATCH_DB_PATH") {
            self.storage.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("VITALWATCH_BIND_ADDR") {
            self.api.bind_addr = v;
        }
        if let Ok(v) = std::env::var("VITALWATCH_SEED") {
            if let Ok(seed) = v.parse::<u64>() {
                self.scheduler.seed = Some(seed);
            }
        }
        if let Ok(v) = std::env::var("NATS_URL") {
            self.nats.url = v;
        }
        self
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<VitalWatchConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path))?;
    let config: VitalWatchConfig = toml::from_str(&contents).context("Failed to parse config")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VitalWatchConfig::default();
        assert_eq!(config.scheduler.tick_interval_ms, 1000);
        assert_eq!(config.scheduler.flush_interval_seconds, 60);
        assert_eq!(config.scheduler.throttle_window_seconds, 60);
        assert_eq!(config.scheduler.forced_abnormal_period, 30);
        assert!(config.scheduler.seed.is_none());
        assert_eq!(config.storage.database_path, PathBuf::from("vitalwatch.db"));
        assert_eq!(config.broadcast.topic, "vitals.snapshots");
        assert!(!config.nats.enabled);
        assert_eq!(config.api.recent_alerts_limit, 50);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [scheduler]
            tick_interval_ms = 500
            flush_interval_seconds = 30
            throttle_window_seconds = 120
            forced_abnormal_period = 10
            operation_timeout_ms = 1000
            seed = 42

            [storage]
            database_path = "/tmp/vitals.db"

            [broadcast]
            topic = "ward.vitals"
            queue_capacity = 16

            [nats]
            enabled = true
            url = "nats://example.com:4222"

            [api]
            enabled = false
            bind_addr = "127.0.0.1:8080"
        "#;

        let config: VitalWatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.scheduler.tick_interval_ms, 500);
        assert_eq!(config.scheduler.throttle_window_seconds, 120);
        assert_eq!(config.scheduler.seed, Some(42));
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/vitals.db"));
        assert_eq!(config.broadcast.topic, "ward.vitals");
        assert_eq!(config.broadcast.queue_capacity, 16);
        // Unset field in a present section keeps its default
        assert_eq!(config.broadcast.channel_capacity, 1000);
        assert!(config.nats.enabled);
        assert_eq!(config.nats.url, "nats://example.com:4222");
        assert!(!config.api.enabled);
        assert_eq!(config.api.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_partial_config() {
        // Missing sections use defaults
        let toml = r#"
            [scheduler]
            seed = 7
        "#;

        let config: VitalWatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.scheduler.seed, Some(7));
        assert_eq!(config.scheduler.tick_interval_ms, 1000);
        assert!(config.api.enabled);
    }

    #[test]
    fn test_out_of_range_interval_rejected() {
        let toml = r#"
            [scheduler]
            flush_interval_seconds = 9223372036854775807
        "#;

        let config: VitalWatchConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("flush_interval_seconds"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitalwatch.toml");
        std::fs::write(&path, toml).unwrap();
        assert!(load_config(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/vitalwatch.toml").is_err());
    }
}
