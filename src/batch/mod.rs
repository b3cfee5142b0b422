// Buffering of abnormal readings and fired alerts pending persistence

mod buffer;

pub use buffer::{BatchBuffer, FlushBatch, FlushOutcome};

use crate::state::{PatientId, PatientState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Abnormal vitals reading captured for durable storage
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalReading {
    pub patient_id: PatientId,
    pub heart_rate: u32,
    pub oxygen: u32,
    pub temperature: f64,
    pub captured_at: DateTime<Utc>,
}

impl VitalReading {
    pub fn from_state(patient_id: PatientId, state: &PatientState, captured_at: DateTime<Utc>) -> Self {
        Self {
            patient_id,
            heart_rate: state.heart_rate,
            oxygen: state.oxygen,
            temperature: state.temperature,
            captured_at,
        }
    }
}

#[cfg(test)]
mod tests;
