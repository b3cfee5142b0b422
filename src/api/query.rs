use crate::alert::AlertEvent;
use crate::batch::VitalReading;
use crate::roster::{Doctor, PatientRecord, RosterSource};
use crate::state::{PatientId, PatientState, StateStore};
use crate::store::DurableStore;
use crate::vitals::Severity;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

const DEFAULT_VITALS_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Shared state for the dashboard query API
pub struct QueryAppState {
    pub states: StateStore,
    pub roster: Arc<dyn RosterSource>,
    pub store: Arc<dyn DurableStore>,
    pub recent_alerts_limit: usize,
}

/// Optional `?limit=` for history endpoints
#[derive(Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

/// Patient with roster details and current live vitals
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientResponse {
    pub patient_id: PatientId,
    pub name: Option<String>,
    pub age: Option<u32>,
    pub doctor: Option<Doctor>,
    /// None until the patient has been simulated at least once
    pub live: Option<PatientState>,
}

/// Alert history entry with the patient's name and doctor resolved
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertResponse {
    pub patient_id: PatientId,
    pub patient_name: Option<String>,
    pub doctor: Option<Doctor>,
    pub severity: Severity,
    pub message: String,
    pub fired_at: DateTime<Utc>,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create dashboard query router
pub fn create_query_router(state: Arc<QueryAppState>) -> Router {
    Router::new()
        .route("/api/patients", get(list_patients))
        .route("/api/patients/:id", get(get_patient))
        .route("/api/patients/:id/vitals", get(patient_vitals))
        .route("/api/alerts", get(recent_alerts))
        .with_state(state)
}

fn patient_response(record: PatientRecord, states: &StateStore) -> PatientResponse {
    PatientResponse {
        patient_id: record.patient_id,
        live: states.get(record.patient_id),
        name: Some(record.name),
        age: record.age,
        doctor: record.doctor,
    }
}

/// GET /api/patients - Roster with live vitals
async fn list_patients(
    State(state): State<Arc<QueryAppState>>,
) -> Result<Json<Vec<PatientResponse>>, QueryError> {
    let patients = state.roster.patients().await?;

    Ok(Json(
        patients
            .into_iter()
            .map(|record| patient_response(record, &state.states))
            .collect(),
    ))
}

/// GET /api/patients/:id - One patient.
///
/// Patients dropped from the roster are still returned while live state
/// exists for them, without roster details.
async fn get_patient(
    State(state): State<Arc<QueryAppState>>,
    Path(id): Path<PatientId>,
) -> Result<Json<PatientResponse>, QueryError> {
    let record = state
        .roster
        .patients()
        .await?
        .into_iter()
        .find(|p| p.patient_id == id);

    match record {
        Some(record) => Ok(Json(patient_response(record, &state.states))),
        None => {
            let live = state.states.get(id).ok_or(QueryError::NotFound)?;
            Ok(Json(PatientResponse {
                patient_id: id,
                name: None,
                age: None,
                doctor: None,
                live: Some(live),
            }))
        }
    }
}

/// GET /api/patients/:id/vitals - Persisted abnormal readings, newest first
async fn patient_vitals(
    State(state): State<Arc<QueryAppState>>,
    Path(id): Path<PatientId>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<VitalReading>>, QueryError> {
    let limit = params.limit.unwrap_or(DEFAULT_VITALS_LIMIT).min(MAX_LIMIT);
    let readings = state.store.recent_readings(id, limit).await?;
    Ok(Json(readings))
}

/// GET /api/alerts - Most recent persisted alerts, newest first
async fn recent_alerts(
    State(state): State<Arc<QueryAppState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<AlertResponse>>, QueryError> {
    let limit = params.limit.unwrap_or(state.recent_alerts_limit).min(MAX_LIMIT);
    let alerts = state.store.recent_alerts(limit).await?;

    // Alerts may reference patients no longer on the roster; that is fine
    let roster: HashMap<PatientId, PatientRecord> = match state.roster.patients().await {
        Ok(patients) => patients.into_iter().map(|p| (p.patient_id, p)).collect(),
        Err(e) => {
            error!(error = %e, "Failed to read roster for alert names");
            HashMap::new()
        }
    };

    Ok(Json(
        alerts
            .into_iter()
            .map(|alert: AlertEvent| {
                let record = roster.get(&alert.patient_id);
                AlertResponse {
                    patient_name: record.map(|r| r.name.clone()),
                    doctor: record.and_then(|r| r.doctor.clone()),
                    patient_id: alert.patient_id,
                    severity: alert.severity,
                    message: alert.message,
                    fired_at: alert.fired_at,
                }
            })
            .collect(),
    ))
}

/// Query error types
#[derive(Debug)]
enum QueryError {
    NotFound,
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for QueryError {
    fn from(e: anyhow::Error) -> Self {
        QueryError::Internal(e)
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            QueryError::NotFound => (StatusCode::NOT_FOUND, "Patient not found".to_string()),
            QueryError::Internal(e) => {
                error!(error = %e, "Status query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}
