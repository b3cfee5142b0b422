// Source of the patient roster polled once per tick

use crate::state::PatientId;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Attending doctor of a roster entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub name: String,
    pub specialization: Option<String>,
    pub phone: Option<String>,
}

/// One roster entry as supplied by the roster source
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub patient_id: PatientId,
    pub name: String,
    pub age: Option<u32>,
    pub doctor: Option<Doctor>,
}

impl PatientRecord {
    pub fn new(patient_id: PatientId, name: impl Into<String>) -> Self {
        Self {
            patient_id,
            name: name.into(),
            age: None,
            doctor: None,
        }
    }

    /// Check the record is usable, returning its id
    pub fn validate(&self) -> Result<PatientId> {
        if self.patient_id <= 0 {
            bail!("invalid patient id {}", self.patient_id);
        }
        Ok(self.patient_id)
    }
}

/// Read-only roster of monitored patients.
///
/// Ids may appear or disappear between calls; the scheduler simply stops
/// updating patients that are no longer listed.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn patients(&self) -> Result<Vec<PatientRecord>>;
}

/// Roster held in memory and editable at runtime
#[derive(Debug, Default)]
pub struct StaticRoster {
    patients: RwLock<Vec<PatientRecord>>,
}

impl StaticRoster {
    pub fn new(patients: Vec<PatientRecord>) -> Self {
        Self {
            patients: RwLock::new(patients),
        }
    }

    /// Build a roster of anonymous patients with the given ids
    pub fn with_ids(ids: impl IntoIterator<Item = PatientId>) -> Self {
        Self::new(
            ids.into_iter()
                .map(|id| PatientRecord::new(id, format!("Patient {}", id)))
                .collect(),
        )
    }

    pub fn add(&self, patient: PatientRecord) -> Result<()> {
        self.patients
            .write()
            .map_err(|_| anyhow!("roster lock poisoned"))?
            .push(patient);
        Ok(())
    }

    pub fn remove(&self, patient_id: PatientId) -> Result<()> {
        self.patients
            .write()
            .map_err(|_| anyhow!("roster lock poisoned"))?
            .retain(|p| p.patient_id != patient_id);
        Ok(())
    }
}

#[async_trait]
impl RosterSource for StaticRoster {
    async fn patients(&self) -> Result<Vec<PatientRecord>> {
        Ok(self
            .patients
            .read()
            .map_err(|_| anyhow!("roster lock poisoned"))?
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_non_positive_ids() {
        assert_eq!(PatientRecord::new(3, "Ada").validate().unwrap(), 3);
        assert!(PatientRecord::new(0, "Nobody").validate().is_err());
        assert!(PatientRecord::new(-4, "Nobody").validate().is_err());
    }

    #[tokio::test]
    async fn test_static_roster_add_remove() {
        let roster = StaticRoster::with_ids([1, 2]);
        assert_eq!(roster.patients().await.unwrap().len(), 2);

        roster.add(PatientRecord::new(3, "Cy")).unwrap();
        roster.remove(1).unwrap();

        let ids: Vec<_> = roster
            .patients()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.patient_id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
