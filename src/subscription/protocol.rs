use crate::state::{PatientId, Snapshot};
use serde::{Deserialize, Serialize};

/// Client → Server message types
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe", rename_all = "camelCase")]
    Subscribe { patient_id: PatientId },
    #[serde(rename = "unsubscribe", rename_all = "camelCase")]
    Unsubscribe { patient_id: PatientId },
}

/// Server → Client: live vitals snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(flatten)]
    pub snapshot: Snapshot,
}

impl From<Snapshot> for SnapshotMessage {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            msg_type: "snapshot".to_string(),
            snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PatientState;
    use crate::vitals::Severity;

    #[test]
    fn test_parse_client_messages() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","patientId":4}"#).unwrap();
        assert_eq!(msg, ClientMessage::Subscribe { patient_id: 4 });

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"unsubscribe","patientId":4}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unsubscribe { patient_id: 4 });

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"bogus"}"#).is_err());
    }

    #[test]
    fn test_snapshot_message_shape() {
        let snapshot = Snapshot::new(2, &PatientState::default(), Severity::Normal);
        let json = serde_json::to_value(SnapshotMessage::from(snapshot)).unwrap();

        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["entityId"], 2);
        assert_eq!(json["heartRate"], 75);
        assert_eq!(json["severity"], "Normal");
    }
}
