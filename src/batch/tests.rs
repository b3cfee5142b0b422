use super::*;
use crate::alert::AlertEvent;
use crate::store::{DurableStore, MemoryStore};
use crate::vitals::Severity;
use chrono::{Duration, Utc};

fn reading(patient_id: i64, heart_rate: u32) -> VitalReading {
    VitalReading {
        patient_id,
        heart_rate,
        oxygen: 91,
        temperature: 36.5,
        captured_at: Utc::now(),
    }
}

fn alert(patient_id: i64) -> AlertEvent {
    AlertEvent::new(patient_id, Severity::Warning, 125, 91, Utc::now())
}

#[test]
fn test_flush_due_after_interval() {
    let start = Utc::now();
    let buffer = BatchBuffer::new(Duration::seconds(60), start);

    assert!(!buffer.flush_due(start));
    assert!(!buffer.flush_due(start + Duration::seconds(59)));
    assert!(buffer.flush_due(start + Duration::seconds(60)));
}

#[tokio::test]
async fn test_successful_flush_clears_queues_and_resets_timer() {
    let start = Utc::now();
    let store = MemoryStore::new();
    let mut buffer = BatchBuffer::new(Duration::seconds(60), start);

    buffer.record_reading(reading(1, 125));
    buffer.record_reading(reading(2, 145));
    buffer.record_alert(alert(1));

    let flushed_at = start + Duration::seconds(60);
    let outcome = buffer.flush(&store, flushed_at).await.unwrap();

    assert_eq!(outcome, FlushOutcome { readings: 2, alerts: 1 });
    assert!(buffer.is_empty());
    assert!(!buffer.flush_due(flushed_at + Duration::seconds(59)));
    assert!(buffer.flush_due(flushed_at + Duration::seconds(60)));

    assert_eq!(store.reading_count().unwrap(), 2);
    assert_eq!(store.alert_count().unwrap(), 1);
}

#[tokio::test]
async fn test_failed_flush_retains_everything() {
    let start = Utc::now();
    let store = MemoryStore::new();
    let mut buffer = BatchBuffer::new(Duration::seconds(60), start);

    buffer.record_reading(reading(1, 125));
    buffer.record_alert(alert(1));

    store.set_unavailable(true);
    let due = start + Duration::seconds(60);
    assert!(buffer.flush(&store, due).await.is_err());

    assert_eq!(buffer.pending_readings().len(), 1);
    assert_eq!(buffer.pending_alerts().len(), 1);
    // Timer not reset by a failure
    assert!(buffer.flush_due(due));

    // Items recorded after the failure ride along with the retry
    buffer.record_reading(reading(2, 140));
    store.set_unavailable(false);
    let outcome = buffer.flush(&store, due + Duration::seconds(1)).await.unwrap();

    assert_eq!(outcome, FlushOutcome { readings: 2, alerts: 1 });
    assert!(buffer.is_empty());

    let persisted = store.recent_readings(1, 10).await.unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].heart_rate, 125);
}

#[tokio::test]
async fn test_empty_flush_skips_store() {
    let start = Utc::now();
    let store = MemoryStore::new();
    store.set_unavailable(true);
    let mut buffer = BatchBuffer::new(Duration::seconds(60), start);

    let due = start + Duration::seconds(60);
    let outcome = buffer.flush(&store, due).await.unwrap();

    assert_eq!(outcome, FlushOutcome::default());
    assert!(!buffer.flush_due(due));
}

#[tokio::test]
async fn test_confirm_keeps_records_buffered_during_write() {
    let start = Utc::now();
    let store = MemoryStore::new();
    let mut buffer = BatchBuffer::new(Duration::seconds(60), start);

    buffer.record_reading(reading(1, 125));
    buffer.record_alert(alert(1));
    let batch = buffer.batch();

    // Arrives while the batch is still being written
    buffer.record_reading(reading(2, 140));

    let outcome = batch.write(&store).await.unwrap();
    let done = start + Duration::seconds(61);
    buffer.confirm(outcome, done);

    assert_eq!(outcome, FlushOutcome { readings: 1, alerts: 1 });
    assert_eq!(buffer.pending_readings().len(), 1);
    assert_eq!(buffer.pending_readings()[0].patient_id, 2);
    assert!(buffer.pending_alerts().is_empty());
    assert!(!buffer.flush_due(done + Duration::seconds(59)));
    assert_eq!(store.reading_count().unwrap(), 1);
}

#[test]
fn test_reading_copies_state() {
    let state = crate::state::PatientState {
        heart_rate: 133,
        oxygen: 92,
        ..Default::default()
    };
    let now = Utc::now();
    let reading = VitalReading::from_state(8, &state, now);

    assert_eq!(reading.patient_id, 8);
    assert_eq!(reading.heart_rate, 133);
    assert_eq!(reading.oxygen, 92);
    assert_eq!(reading.temperature, 36.5);
    assert_eq!(reading.captured_at, now);
}
