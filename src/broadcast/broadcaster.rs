use crate::broadcast::{BroadcastConfig, BroadcastSink};
use crate::state::Snapshot;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Publishes per-patient snapshots without ever blocking the caller.
///
/// In-process subscribers receive snapshots through a broadcast channel;
/// slow ones lag and skip rather than applying back-pressure. External sinks
/// are fed from a bounded queue drained by a single delivery task, which keeps
/// snapshots for a patient in tick order.
pub struct Broadcaster {
    local_tx: broadcast::Sender<Snapshot>,
    queue_tx: mpsc::Sender<Snapshot>,
}

impl Broadcaster {
    /// Create a broadcaster and spawn its delivery task.
    ///
    /// The task runs until `cancel` fires or the broadcaster is dropped.
    pub fn spawn(
        config: &BroadcastConfig,
        sinks: Vec<Arc<dyn BroadcastSink>>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (local_tx, _) = broadcast::channel(config.channel_capacity.max(1));
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));

        let handle = tokio::spawn(run_delivery(
            queue_rx,
            sinks,
            config.topic.clone(),
            Duration::from_millis(config.publish_timeout_ms),
            cancel,
        ));

        (Self { local_tx, queue_tx }, handle)
    }

    /// Fire-and-forget publish of one snapshot
    pub fn publish(&self, snapshot: Snapshot) {
        // No in-process subscribers is fine
        let _ = self.local_tx.send(snapshot.clone());

        match self.queue_tx.try_send(snapshot) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    patient_id = dropped.patient_id,
                    "Broadcast queue full, dropping snapshot"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Broadcast delivery task stopped, snapshot not forwarded");
            }
        }
    }

    /// Subscribe to snapshots in-process
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.local_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.local_tx.receiver_count()
    }
}

async fn run_delivery(
    mut queue_rx: mpsc::Receiver<Snapshot>,
    sinks: Vec<Arc<dyn BroadcastSink>>,
    topic: String,
    publish_timeout: Duration,
    cancel: CancellationToken,
) {
    info!(sinks = sinks.len(), topic = %topic, "Starting broadcast delivery");

    loop {
        let snapshot = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = queue_rx.recv() => match next {
                Some(snapshot) => snapshot,
                None => break,
            },
        };

        if sinks.is_empty() {
            continue;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = deliver(&sinks, &topic, &snapshot, publish_timeout) => {}
        }
    }

    info!("Broadcast delivery stopped");
}

/// Send one snapshot to every sink concurrently; failures are logged per sink
async fn deliver(
    sinks: &[Arc<dyn BroadcastSink>],
    topic: &str,
    snapshot: &Snapshot,
    publish_timeout: Duration,
) {
    let payload = match serde_json::to_vec(snapshot) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, patient_id = snapshot.patient_id, "Failed to serialize snapshot");
            return;
        }
    };

    let deliveries = sinks.iter().map(|sink| {
        let payload = payload.clone();
        async move {
            match tokio::time::timeout(publish_timeout, sink.publish(topic, payload)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(sink = sink.name(), error = %e, "Snapshot delivery failed");
                }
                Err(_) => {
                    warn!(sink = sink.name(), "Snapshot delivery timed out");
                }
            }
        }
    });

    join_all(deliveries).await;
}
