// Alert events and repeat-notification throttling

use crate::state::{PatientId, PatientState};
use crate::vitals::Severity;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Notification recorded when the throttler decides to fire
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub patient_id: PatientId,
    pub severity: Severity,
    pub message: String,
    pub fired_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(
        patient_id: PatientId,
        severity: Severity,
        heart_rate: u32,
        oxygen: u32,
        fired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            patient_id,
            severity,
            message: format!("{} Vitals: HR {}, SpO2 {}%", severity, heart_rate, oxygen),
            fired_at,
        }
    }
}

/// Decides whether an abnormal reading should produce a notification.
///
/// Fires when severity differs from the previous tick, or when at least
/// `window` has passed since the last alert for this patient.
#[derive(Clone, Debug)]
pub struct AlertThrottler {
    window: Duration,
}

impl AlertThrottler {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn should_fire(&self, current: Severity, state: &PatientState, now: DateTime<Utc>) -> bool {
        if !current.is_abnormal() {
            return false;
        }

        if current != state.last_severity {
            return true;
        }

        match state.last_alert_at {
            None => true,
            Some(last) => now - last >= self.window,
        }
    }
}

impl Default for AlertThrottler {
    fn default() -> Self {
        Self::new(Duration::seconds(60))
    }
}
