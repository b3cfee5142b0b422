// Live snapshot fan-out to in-process subscribers and external sinks

mod broadcaster;
pub mod config;

pub use broadcaster::Broadcaster;
pub use config::BroadcastConfig;

use anyhow::Result;
use async_trait::async_trait;

/// External publish channel (message bus, push gateway, ...)
#[async_trait]
pub trait BroadcastSink: Send + Sync {
    /// Name used in delivery logs
    fn name(&self) -> &str;

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}
