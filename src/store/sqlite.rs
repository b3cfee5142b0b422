//! SQLite-backed persistence for vitals history, alert history and the
//! patient roster.

use crate::alert::AlertEvent;
use crate::batch::VitalReading;
use crate::roster::{Doctor, PatientRecord, RosterSource};
use crate::state::PatientId;
use crate::store::DurableStore;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS doctors (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        specialization TEXT,
        phone TEXT
    );

    CREATE TABLE IF NOT EXISTS patients (
        patient_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        age INTEGER,
        doctor_id INTEGER REFERENCES doctors(id)
    );

    CREATE TABLE IF NOT EXISTS vital_signs (
        id INTEGER PRIMARY KEY,
        patient_id INTEGER NOT NULL,
        heart_rate INTEGER NOT NULL,
        oxygen INTEGER NOT NULL,
        temperature REAL NOT NULL,
        captured_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS alert_history (
        id INTEGER PRIMARY KEY,
        patient_id INTEGER NOT NULL,
        severity TEXT NOT NULL,
        message TEXT NOT NULL,
        fired_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_vital_signs_patient
        ON vital_signs(patient_id, captured_at);
    CREATE INDEX IF NOT EXISTS idx_alert_history_fired
        ON alert_history(fired_at);
"#;

/// Store backed by a single SQLite database file.
///
/// # Schema
/// - `doctors` / `patients`: the roster, read once per tick
/// - `vital_signs`: abnormal readings appended by batch flushes
/// - `alert_history`: fired alerts appended by batch flushes
///
/// Timestamps are stored as RFC 3339 UTC text with fixed microsecond
/// precision so lexical order matches time order.
///
/// # Thread Safety
/// The connection sits behind a mutex; async operations run on the blocking
/// pool so a slow disk never stalls the scheduler's runtime thread.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at `db_path` and ensure the schema exists
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open database")?;
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Register a doctor, returning the new doctor id
    pub fn insert_doctor(&self, name: &str, specialization: Option<&str>, phone: Option<&str>) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO doctors (name, specialization, phone) VALUES (?1, ?2, ?3)",
            params![name, specialization, phone],
        )
        .context("Failed to insert doctor")?;
        Ok(conn.last_insert_rowid())
    }

    /// Register a patient, returning the new patient id
    pub fn insert_patient(&self, name: &str, age: Option<u32>, doctor_id: Option<i64>) -> Result<PatientId> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO patients (name, age, doctor_id) VALUES (?1, ?2, ?3)",
            params![name, age, doctor_id],
        )
        .context("Failed to insert patient")?;
        Ok(conn.last_insert_rowid())
    }

    /// Remove a patient from the roster (history rows are kept)
    pub fn remove_patient(&self, patient_id: PatientId) -> Result<bool> {
        let removed = self
            .lock()?
            .execute("DELETE FROM patients WHERE patient_id = ?1", params![patient_id])
            .context("Failed to delete patient")?;
        Ok(removed > 0)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| anyhow!("SQLite connection lock poisoned"))?;
            op(&mut conn)
        })
        .await
        .context("SQLite task failed")?
    }
}

fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp '{}'", raw))
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn append_readings(&self, readings: &[VitalReading]) -> Result<()> {
        let readings = readings.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction().context("Failed to begin transaction")?;
            {
                let mut stmt = tx
                    .prepare_cached(
                        "INSERT INTO vital_signs (patient_id, heart_rate, oxygen, temperature, captured_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )
                    .context("Failed to prepare insert")?;

                for r in &readings {
                    stmt.execute(params![
                        r.patient_id,
                        r.heart_rate,
                        r.oxygen,
                        r.temperature,
                        encode_ts(&r.captured_at),
                    ])
                    .context("Failed to insert vital reading")?;
                }
            }
            tx.commit().context("Failed to commit vital readings")
        })
        .await
    }

    async fn append_alerts(&self, alerts: &[AlertEvent]) -> Result<()> {
        let alerts = alerts.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction().context("Failed to begin transaction")?;
            {
                let mut stmt = tx
                    .prepare_cached(
                        "INSERT INTO alert_history (patient_id, severity, message, fired_at)
                         VALUES (?1, ?2, ?3, ?4)",
                    )
                    .context("Failed to prepare insert")?;

                for a in &alerts {
                    stmt.execute(params![
                        a.patient_id,
                        a.severity.as_str(),
                        a.message,
                        encode_ts(&a.fired_at),
                    ])
                    .context("Failed to insert alert")?;
                }
            }
            tx.commit().context("Failed to commit alerts")
        })
        .await
    }

    async fn recent_readings(&self, patient_id: PatientId, limit: usize) -> Result<Vec<VitalReading>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT patient_id, heart_rate, oxygen, temperature, captured_at
                     FROM vital_signs
                     WHERE patient_id = ?1
                     ORDER BY captured_at DESC, id DESC
                     LIMIT ?2",
                )
                .context("Failed to prepare query")?;

            let rows = stmt
                .query_map(params![patient_id, limit as i64], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })
                .context("Failed to execute query")?;

            let mut readings = Vec::new();
            for row in rows {
                let (patient_id, heart_rate, oxygen, temperature, captured_at) =
                    row.context("Failed to read row")?;
                readings.push(VitalReading {
                    patient_id,
                    heart_rate,
                    oxygen,
                    temperature,
                    captured_at: decode_ts(&captured_at)?,
                });
            }
            Ok(readings)
        })
        .await
    }

    async fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertEvent>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT patient_id, severity, message, fired_at
                     FROM alert_history
                     ORDER BY fired_at DESC, id DESC
                     LIMIT ?1",
                )
                .context("Failed to prepare query")?;

            let rows = stmt
                .query_map(params![limit as i64], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .context("Failed to execute query")?;

            let mut alerts = Vec::new();
            for row in rows {
                let (patient_id, severity, message, fired_at) = row.context("Failed to read row")?;
                alerts.push(AlertEvent {
                    patient_id,
                    severity: severity.parse()?,
                    message,
                    fired_at: decode_ts(&fired_at)?,
                });
            }
            Ok(alerts)
        })
        .await
    }
}

#[async_trait]
impl RosterSource for SqliteStore {
    async fn patients(&self) -> Result<Vec<PatientRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT p.patient_id, p.name, p.age, d.name, d.specialization, d.phone
                     FROM patients p
                     LEFT JOIN doctors d ON d.id = p.doctor_id
                     ORDER BY p.patient_id",
                )
                .context("Failed to prepare roster query")?;

            let rows = stmt
                .query_map([], |row| {
                    let doctor_name: Option<String> = row.get(3)?;
                    let specialization: Option<String> = row.get(4)?;
                    let phone: Option<String> = row.get(5)?;
                    Ok(PatientRecord {
                        patient_id: row.get(0)?,
                        name: row.get(1)?,
                        age: row.get(2)?,
                        doctor: doctor_name.map(|name| Doctor {
                            name,
                            specialization,
                            phone,
                        }),
                    })
                })
                .context("Failed to execute roster query")?;

            let mut patients = Vec::new();
            for row in rows {
                match row {
                    Ok(patient) => patients.push(patient),
                    Err(e) => warn!(error = %e, "Skipping unreadable patient row"),
                }
            }
            Ok(patients)
        })
        .await
    }
}
