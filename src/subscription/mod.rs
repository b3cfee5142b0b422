// WebSocket subscription management for live snapshots

mod manager;
mod protocol;

pub use manager::ConnectionManager;
pub use protocol::{ClientMessage, SnapshotMessage};
