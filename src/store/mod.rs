// Durable storage of abnormal readings and fired alerts

mod sqlite;

pub use sqlite::SqliteStore;

use crate::alert::AlertEvent;
use crate::batch::VitalReading;
use crate::state::PatientId;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Append/query interface to the persistent store.
///
/// Each append must succeed or fail as a whole batch. Callers treat any
/// error as retryable.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn append_readings(&self, readings: &[VitalReading]) -> Result<()>;

    async fn append_alerts(&self, alerts: &[AlertEvent]) -> Result<()>;

    /// Most recent readings for one patient, newest first
    async fn recent_readings(&self, patient_id: PatientId, limit: usize) -> Result<Vec<VitalReading>>;

    /// Most recent alerts across all patients, newest first
    async fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertEvent>>;
}

/// Process-local store. Can be switched into a failing mode to exercise
/// retry paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: Mutex<Vec<VitalReading>>,
    alerts: Mutex<Vec<AlertEvent>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every append fails and nothing is written
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn reading_count(&self) -> Result<usize> {
        Ok(lock(&self.readings)?.len())
    }

    pub fn alert_count(&self) -> Result<usize> {
        Ok(lock(&self.alerts)?.len())
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("memory store unavailable");
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("memory store lock poisoned"))
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn append_readings(&self, readings: &[VitalReading]) -> Result<()> {
        self.check_available()?;
        lock(&self.readings)?.extend_from_slice(readings);
        Ok(())
    }

    async fn append_alerts(&self, alerts: &[AlertEvent]) -> Result<()> {
        self.check_available()?;
        lock(&self.alerts)?.extend_from_slice(alerts);
        Ok(())
    }

    async fn recent_readings(&self, patient_id: PatientId, limit: usize) -> Result<Vec<VitalReading>> {
        let readings = lock(&self.readings)?;
        Ok(readings
            .iter()
            .rev()
            .filter(|r| r.patient_id == patient_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertEvent>> {
        let alerts = lock(&self.alerts)?;
        Ok(alerts.iter().rev().take(limit).cloned().collect())
    }
}
