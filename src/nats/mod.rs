// NATS sink for live snapshot delivery

use crate::broadcast::BroadcastSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// NATS configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NatsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_url")]
    pub url: String,
}

fn default_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_url(),
        }
    }
}

/// Publishes snapshots as core NATS messages (no JetStream persistence;
/// snapshots are ephemeral)
pub struct NatsSink {
    client: async_nats::Client,
}

impl NatsSink {
    /// Connect to the NATS server
    pub async fn connect(config: &NatsConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::connect(&config.url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS");

        Ok(Self { client })
    }
}

#[async_trait]
impl BroadcastSink for NatsSink {
    fn name(&self) -> &str {
        "nats"
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic.to_string(), payload.into())
            .await
            .with_context(|| format!("Failed to publish snapshot to subject '{}'", topic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nats_disabled_by_default() {
        let config = NatsConfig::default();
        assert!(!config.enabled);
        assert!(!config.url.is_empty());
    }
}
