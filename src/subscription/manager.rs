use crate::state::{PatientId, Snapshot};
use crate::subscription::protocol::{ClientMessage, SnapshotMessage};
use axum::extract::ws::{Message, WebSocket};
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Manages a single WebSocket connection with patient subscriptions
pub struct ConnectionManager {
    /// Patients this connection is subscribed to (empty = all)
    subscriptions: HashSet<PatientId>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            subscriptions: HashSet::new(),
        }
    }

    /// Handle WebSocket connection lifecycle
    pub async fn handle(mut self, mut socket: WebSocket, mut snapshot_rx: broadcast::Receiver<Snapshot>) {
        info!("WebSocket connection established");

        loop {
            tokio::select! {
                Some(msg) = socket.recv() => {
                    match msg {
                        Ok(Message::Text(text)) => {
                            if let Err(e) = self.handle_client_message(&text) {
                                warn!(error = %e, "Ignoring invalid client message");
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!("WebSocket client disconnected");
                            break;
                        }
                        Ok(Message::Ping(data)) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                error!(error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                result = snapshot_rx.recv() => {
                    match result {
                        Ok(snapshot) => {
                            if self.should_forward(&snapshot) {
                                if let Err(e) = send_snapshot(&mut socket, snapshot).await {
                                    warn!(error = %e, "Failed to send snapshot, closing connection");
                                    break;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped = skipped, "WebSocket lagged, skipped snapshots");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("Snapshot channel closed");
                            break;
                        }
                    }
                }

                else => {
                    break;
                }
            }
        }

        info!("WebSocket connection closed");
    }

    /// Apply a subscribe/unsubscribe request
    fn handle_client_message(&mut self, text: &str) -> anyhow::Result<()> {
        let msg: ClientMessage = serde_json::from_str(text)?;

        match msg {
            ClientMessage::Subscribe { patient_id } => {
                info!(patient_id, "Client subscribed to patient");
                self.subscriptions.insert(patient_id);
            }
            ClientMessage::Unsubscribe { patient_id } => {
                info!(patient_id, "Client unsubscribed from patient");
                self.subscriptions.remove(&patient_id);
            }
        }

        Ok(())
    }

    fn should_forward(&self, snapshot: &Snapshot) -> bool {
        self.subscriptions.is_empty() || self.subscriptions.contains(&snapshot.patient_id)
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn send_snapshot(socket: &mut WebSocket, snapshot: Snapshot) -> anyhow::Result<()> {
    let json = serde_json::to_string(&SnapshotMessage::from(snapshot))?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
