use crate::vitals::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Patient identifier as issued by the roster
pub type PatientId = i64;

/// Live simulation state for one monitored patient
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientState {
    pub heart_rate: u32,
    pub oxygen: u32,
    pub temperature: f64,

    /// Monotonic per-patient tick counter
    pub tick_count: u64,

    /// Severity computed on the most recent tick
    pub last_severity: Severity,

    /// When the last alert fired (None = never)
    pub last_alert_at: Option<DateTime<Utc>>,
}

impl Default for PatientState {
    fn default() -> Self {
        Self {
            heart_rate: 75,
            oxygen: 98,
            temperature: 36.5,
            tick_count: 0,
            last_severity: Severity::Normal,
            last_alert_at: None,
        }
    }
}

/// Per-tick snapshot broadcast to live subscribers (never persisted)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(rename = "entityId")]
    pub patient_id: PatientId,
    pub heart_rate: u32,
    pub oxygen: u32,
    pub temperature: f64,
    pub severity: Severity,
}

impl Snapshot {
    pub fn new(patient_id: PatientId, state: &PatientState, severity: Severity) -> Self {
        Self {
            patient_id,
            heart_rate: state.heart_rate,
            oxygen: state.oxygen,
            temperature: state.temperature,
            severity,
        }
    }
}
