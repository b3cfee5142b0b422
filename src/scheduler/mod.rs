// Fixed-rate tick loop driving simulation, alerting, buffering and broadcast

pub mod config;

pub use config::SchedulerConfig;

use crate::alert::{AlertEvent, AlertThrottler};
use crate::batch::{BatchBuffer, FlushOutcome, VitalReading};
use crate::broadcast::Broadcaster;
use crate::clock::Clock;
use crate::roster::{PatientRecord, RosterSource};
use crate::state::{PatientId, Snapshot, StateStore};
use crate::store::DurableStore;
use crate::vitals::{classify, VitalsGenerator};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};


/// What happened during one tick
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Patients simulated this tick
    pub processed: usize,
    /// Roster records skipped as malformed or duplicate
    pub skipped: usize,
    /// Abnormal readings buffered
    pub readings: usize,
    /// Alerts fired
    pub alerts: usize,
    /// Set when a due flush succeeded
    pub flushed: Option<FlushOutcome>,
    /// Set when a due flush failed or was abandoned
    pub flush_failed: bool,
    /// Set while an earlier flush is still being written; no new flush
    /// starts until it resolves
    pub flush_pending: bool,
}

/// Per-patient result of one tick
struct PatientOutcome {
    recorded_reading: bool,
    fired_alert: bool,
}

/// Drives every tick: roster read, per-patient
/// generate → classify → buffer → throttle → broadcast, then a due flush.
///
/// The scheduler is the only writer of patient state and of the batch
/// buffer. Readers get a shared [`StateStore`] handle via [`Scheduler::states`].
///
/// Roster reads and flushes run as tasks. One that outlives the operation
/// timeout is kept and awaited again on later ticks instead of being
/// started a second time, so at most one flush is ever writing.
pub struct Scheduler {
    roster: Arc<dyn RosterSource>,
    store: Arc<dyn DurableStore>,
    broadcaster: Arc<Broadcaster>,
    clock: Arc<dyn Clock>,
    states: StateStore,
    generator: VitalsGenerator,
    throttler: AlertThrottler,
    buffer: BatchBuffer,
    rng: StdRng,
    tick_interval: Duration,
    operation_timeout: Duration,
    pending_roster: Option<JoinHandle<Result<Vec<PatientRecord>>>>,
    in_flight_flush: Option<JoinHandle<Result<FlushOutcome>>>,
}

impl Scheduler {
    pub fn new(
        config: &SchedulerConfig,
        roster: Arc<dyn RosterSource>,
        store: Arc<dyn DurableStore>,
        broadcaster: Arc<Broadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let buffer = BatchBuffer::new(config.flush_interval()?, clock.now());
        let throttler = AlertThrottler::new(config.throttle_window()?);

        Ok(Self {
            roster,
            store,
            broadcaster,
            clock,
            states: StateStore::new(),
            generator: VitalsGenerator::new(config.forced_abnormal_period),
            throttler,
            buffer,
            rng,
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            operation_timeout: Duration::from_millis(config.operation_timeout_ms.max(1)),
            pending_roster: None,
            in_flight_flush: None,
        })
    }

    /// Replace the random source
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Shared read handle on live patient state
    pub fn states(&self) -> StateStore {
        self.states.clone()
    }

    /// Records buffered but not yet persisted
    pub fn buffer(&self) -> &BatchBuffer {
        &self.buffer
    }

    /// Run ticks at the configured period until `cancel` fires.
    ///
    /// Cancellation is observed between ticks; an in-flight tick always
    /// finishes its patients. No final flush is forced on exit.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "Starting vitals scheduler"
        );

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let report = self.tick(&cancel).await;
            debug!(
                processed = report.processed,
                skipped = report.skipped,
                readings = report.readings,
                alerts = report.alerts,
                "Tick complete"
            );
        }

        if let Some(handle) = self.pending_roster.take() {
            handle.abort();
        }

        if let Some(handle) = self.in_flight_flush.take() {
            match tokio::time::timeout(self.operation_timeout, handle).await {
                Ok(Ok(Ok(outcome))) => {
                    self.buffer.confirm(outcome, self.clock.now());
                    info!(
                        readings = outcome.readings,
                        alerts = outcome.alerts,
                        "In-flight flush completed during shutdown"
                    );
                }
                _ => warn!("In-flight flush did not complete before shutdown"),
            }
        }

        if !self.buffer.is_empty() {
            warn!(
                pending_readings = self.buffer.pending_readings().len(),
                pending_alerts = self.buffer.pending_alerts().len(),
                "Scheduler stopped with unflushed records"
            );
        }
        info!("Vitals scheduler stopped");
    }

    /// Execute a single tick
    pub async fn tick(&mut self, cancel: &CancellationToken) -> TickReport {
        let now = self.clock.now();
        let mut report = TickReport::default();

        let patients = match self.read_roster(cancel).await {
            Some(Ok(patients)) => patients,
            Some(Err(e)) => {
                warn!(error = %e, "Failed to read patient roster, no patients updated this tick");
                Vec::new()
            }
            None => {
                warn!("Roster read not finished, no patients updated this tick");
                Vec::new()
            }
        };

        let mut seen = HashSet::with_capacity(patients.len());
        for patient in &patients {
            let patient_id = match patient.validate() {
                Ok(id) => id,
                Err(e) => {
                    warn!(error = %e, name = %patient.name, "Skipping malformed roster record");
                    report.skipped += 1;
                    continue;
                }
            };

            if !seen.insert(patient_id) {
                debug!(patient_id, "Duplicate roster entry ignored");
                report.skipped += 1;
                continue;
            }

            let outcome = self.process_patient(patient_id, &patient.name, now);
            report.processed += 1;
            if outcome.recorded_reading {
                report.readings += 1;
            }
            if outcome.fired_alert {
                report.alerts += 1;
            }
        }

        match self.in_flight_flush.take() {
            Some(handle) => self.finish_flush(handle, cancel, now, &mut report).await,
            None if self.buffer.flush_due(now) && cancel.is_cancelled() => {
                report.flush_failed = true;
            }
            None if self.buffer.flush_due(now) => {
                let batch = self.buffer.batch();
                if batch.is_empty() {
                    self.buffer.confirm(FlushOutcome::default(), now);
                    report.flushed = Some(FlushOutcome::default());
                } else {
                    let store = Arc::clone(&self.store);
                    let handle = tokio::spawn(async move { batch.write(store.as_ref()).await });
                    self.finish_flush(handle, cancel, now, &mut report).await;
                }
            }
            None => {}
        }

        report
    }

    /// Await the roster, reusing a read left over from an earlier tick.
    ///
    /// None when the read is still running after the operation timeout.
    async fn read_roster(&mut self, cancel: &CancellationToken) -> Option<Result<Vec<PatientRecord>>> {
        let mut handle = match self.pending_roster.take() {
            Some(handle) => handle,
            None => {
                let roster = Arc::clone(&self.roster);
                tokio::spawn(async move { roster.patients().await })
            }
        };

        let result = join_bounded(cancel, self.operation_timeout, &mut handle).await;
        if result.is_none() {
            self.pending_roster = Some(handle);
        }
        result
    }

    /// Wait for a flush task and apply its real result to the buffer.
    ///
    /// A flush still running after the operation timeout is kept in flight;
    /// the buffer is only trimmed once the store has confirmed the batch.
    async fn finish_flush(
        &mut self,
        mut handle: JoinHandle<Result<FlushOutcome>>,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) {
        match join_bounded(cancel, self.operation_timeout, &mut handle).await {
            Some(Ok(outcome)) => {
                self.buffer.confirm(outcome, now);
                if outcome.readings > 0 || outcome.alerts > 0 {
                    info!(
                        readings = outcome.readings,
                        alerts = outcome.alerts,
                        "Flushed batch to store"
                    );
                }
                report.flushed = Some(outcome);
            }
            Some(Err(e)) => {
                warn!(
                    error = %e,
                    pending_readings = self.buffer.pending_readings().len(),
                    pending_alerts = self.buffer.pending_alerts().len(),
                    "Batch flush failed, records kept for retry"
                );
                report.flush_failed = true;
            }
            None => {
                warn!(
                    pending_readings = self.buffer.pending_readings().len(),
                    pending_alerts = self.buffer.pending_alerts().len(),
                    "Batch flush still running, no new flush until it completes"
                );
                self.in_flight_flush = Some(handle);
                report.flush_pending = true;
            }
        }
    }

    fn process_patient(&mut self, patient_id: PatientId, name: &str, now: DateTime<Utc>) -> PatientOutcome {
        let mut state = self.states.load_or_create(patient_id);
        let mut outcome = PatientOutcome {
            recorded_reading: false,
            fired_alert: false,
        };

        self.generator.advance(&mut state, &mut self.rng);
        let severity = classify(state.heart_rate, state.oxygen, state.temperature);

        if severity.is_abnormal() {
            self.buffer
                .record_reading(VitalReading::from_state(patient_id, &state, now));
            outcome.recorded_reading = true;

            if self.throttler.should_fire(severity, &state, now) {
                self.buffer.record_alert(AlertEvent::new(
                    patient_id,
                    severity,
                    state.heart_rate,
                    state.oxygen,
                    now,
                ));
                state.last_alert_at = Some(now);
                outcome.fired_alert = true;

                info!(
                    patient_id,
                    patient = %name,
                    severity = %severity,
                    heart_rate = state.heart_rate,
                    oxygen = state.oxygen,
                    "Alert sent"
                );
            }
        }

        state.last_severity = severity;
        let snapshot = Snapshot::new(patient_id, &state, severity);
        self.states.save(patient_id, state);
        self.broadcaster.publish(snapshot);

        outcome
    }
}

/// Await a task for at most `limit`, giving up early on cancellation.
///
/// None means the task is still running and `handle` remains valid.
async fn join_bounded<T>(
    cancel: &CancellationToken,
    limit: Duration,
    handle: &mut JoinHandle<Result<T>>,
) -> Option<Result<T>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        joined = tokio::time::timeout(limit, handle) => match joined {
            Ok(result) => Some(result.context("Background task failed").and_then(|inner| inner)),
            Err(_) => None,
        },
    }
}
