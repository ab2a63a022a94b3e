//! HTTP request handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use postforge_scheduler::{
    JobDefinition, JobId, LockdownStatus, ScheduledJob, TriggerRequest, TriggerSource,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Response for listing jobs.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub count: usize,
    pub jobs: Vec<ScheduledJob>,
}

/// Response for a single job.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job: ScheduledJob,
}

/// One run currently in flight.
#[derive(Debug, Serialize)]
pub struct InFlightRun {
    pub job_id: JobId,
    pub run_id: String,
    pub source: TriggerSource,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Response for `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Armed timers keyed by job id.
    pub timers: BTreeMap<JobId, String>,
    pub in_flight: Vec<InFlightRun>,
    pub emergency: LockdownStatus,
    pub denied_triggers: u64,
    pub initialized: bool,
}

fn require_operator(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if state.identity.is_operator(headers) {
        Ok(())
    } else {
        warn!("Rejected control request without operator credential");
        Err(ApiError::Forbidden(
            "authenticated interactive session required".to_string(),
        ))
    }
}

/// POST /jobs
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(definition): Json<JobDefinition>,
) -> Result<impl IntoResponse, ApiError> {
    require_operator(&state, &headers)?;
    let job = state.scheduler.create_job(definition).await?;
    Ok((StatusCode::CREATED, Json(JobResponse { job })))
}

/// GET /jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JobListResponse>, ApiError> {
    let jobs = state.scheduler.list_jobs().await?;
    Ok(Json(JobListResponse {
        count: jobs.len(),
        jobs,
    }))
}

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.scheduler.get_job(id).await?;
    Ok(Json(JobResponse { job }))
}

/// PUT /jobs/{id}
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
    headers: HeaderMap,
    Json(definition): Json<JobDefinition>,
) -> Result<Json<JobResponse>, ApiError> {
    require_operator(&state, &headers)?;
    let job = state.scheduler.update_job(id, definition).await?;
    Ok(Json(JobResponse { job }))
}

/// DELETE /jobs/{id}
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    require_operator(&state, &headers)?;
    state.scheduler.delete_job(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /trigger/{id}
///
/// The body is read raw so webhook signatures cover exactly what was sent.
pub async fn trigger_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let descriptor = state.identity.describe(&headers, &body);
    info!(job_id = id, source = %descriptor, "Manual trigger received");

    let report = state
        .scheduler
        .trigger_now(TriggerRequest::new(id, descriptor))
        .await?;
    Ok(Json(report))
}

/// GET /status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let runner = state.scheduler.runner();
    let in_flight = runner
        .in_flight_jobs()
        .into_iter()
        .filter_map(|job_id| {
            runner
                .in_flight_run(job_id)
                .map(|(run_id, source, started_at)| InFlightRun {
                    job_id,
                    run_id: run_id.to_string(),
                    source,
                    started_at,
                })
        })
        .collect();

    Json(StatusResponse {
        timers: state.scheduler.registry().list_active(),
        in_flight,
        emergency: state.emergency.status(),
        denied_triggers: runner.gate().denied_count(),
        initialized: state.scheduler.is_initialized(),
    })
}

/// POST /emergency-stop
pub async fn emergency_stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    warn!("Emergency stop requested over HTTP");
    let report = state.emergency.stop_all().await;
    let status = state.emergency.status();
    Json(serde_json::json!({
        "report": report,
        "status": status,
    }))
}

/// POST /emergency-resume
pub async fn emergency_resume(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<LockdownStatus>, ApiError> {
    require_operator(&state, &headers)?;
    state.emergency.resume();
    Ok(Json(state.emergency.status()))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime().as_secs(),
    }))
}
