use crate::alert::AlertEvent;
use crate::batch::VitalReading;
use crate::store::DurableStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

/// Counts of records written by one successful flush
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub readings: usize,
    pub alerts: usize,
}

/// In-memory queues of readings and alerts awaiting a bulk write.
///
/// Single writer: only the scheduler records and flushes. Queues are cleared
/// only after the store confirms both appends, so a failed or abandoned flush
/// is retried in full on the next due cycle (at-least-once; a failure between
/// the two appends can persist readings twice).
#[derive(Debug)]
pub struct BatchBuffer {
    readings: Vec<VitalReading>,
    alerts: Vec<AlertEvent>,
    interval: Duration,
    last_flush: DateTime<Utc>,
}

impl BatchBuffer {
    /// Create an empty buffer whose flush timer starts at `now`
    pub fn new(interval: Duration, now: DateTime<Utc>) -> Self {
        Self {
            readings: Vec::new(),
            alerts: Vec::new(),
            interval,
            last_flush: now,
        }
    }

    pub fn record_reading(&mut self, reading: VitalReading) {
        self.readings.push(reading);
    }

    pub fn record_alert(&mut self, alert: AlertEvent) {
        self.alerts.push(alert);
    }

    /// True once `interval` has elapsed since the last successful flush
    pub fn flush_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_flush >= self.interval
    }

    pub fn pending_readings(&self) -> &[VitalReading] {
        &self.readings
    }

    pub fn pending_alerts(&self) -> &[AlertEvent] {
        &self.alerts
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty() && self.alerts.is_empty()
    }

    /// Copy of everything currently buffered, for writing off the tick path
    pub fn batch(&self) -> FlushBatch {
        FlushBatch {
            readings: self.readings.clone(),
            alerts: self.alerts.clone(),
        }
    }

    /// Drop the records a completed [`FlushBatch`] wrote and restart the
    /// flush timer at `now`.
    ///
    /// Records buffered after the batch was taken sit behind it in the
    /// queues and are kept.
    pub fn confirm(&mut self, outcome: FlushOutcome, now: DateTime<Utc>) {
        self.readings.drain(..outcome.readings.min(self.readings.len()));
        self.alerts.drain(..outcome.alerts.min(self.alerts.len()));
        self.last_flush = now;
    }

    /// Write everything buffered to `store`.
    ///
    /// On success both queues are cleared and the flush timer restarts at
    /// `now`. On error nothing is cleared and the timer is left alone.
    pub async fn flush(&mut self, store: &dyn DurableStore, now: DateTime<Utc>) -> Result<FlushOutcome> {
        let outcome = self.batch().write(store).await?;
        self.confirm(outcome, now);
        Ok(outcome)
    }
}

/// Snapshot of buffered records handed to the store in one flush
#[derive(Clone, Debug, Default)]
pub struct FlushBatch {
    readings: Vec<VitalReading>,
    alerts: Vec<AlertEvent>,
}

impl FlushBatch {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty() && self.alerts.is_empty()
    }

    /// Append readings then alerts. Empty lists never reach the store.
    pub async fn write(self, store: &dyn DurableStore) -> Result<FlushOutcome> {
        if !self.readings.is_empty() {
            store
                .append_readings(&self.readings)
                .await
                .context("Failed to append vital readings")?;
        }

        if !self.alerts.is_empty() {
            store
                .append_alerts(&self.alerts)
                .await
                .context("Failed to append alerts")?;
        }

        Ok(FlushOutcome {
            readings: self.readings.len(),
            alerts: self.alerts.len(),
        })
    }
}
