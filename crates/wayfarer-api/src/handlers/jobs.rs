//! `/sessions/{device}/jobs` — job listing, submission, and cancellation.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use wayfarer_core::{Packet, JobStatus};

use super::{parse_device, ApiState};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Serialize)]
pub struct JobSummary {
    pub id: u16,
    pub job_type: u8,
    pub status: JobStatus,
    pub start_millis: u64,
    pub complete_millis: Option<u64>,
    pub error: Option<String>,
}

impl From<wayfarer_core::Job> for JobSummary {
    fn from(j: wayfarer_core::Job) -> Self {
        JobSummary {
            id: j.id,
            job_type: j.job_type,
            status: j.status,
            start_millis: j.start,
            complete_millis: j.complete,
            error: j.error,
        }
    }
}

pub async fn handle_job_list(
    State(state): State<ApiState>,
    Path(device_hex): Path<String>,
) -> Result<Json<Vec<JobSummary>>, (StatusCode, String)> {
    let device = parse_device(&device_hex)?;
    let session = state
        .server
        .sessions
        .get(&device)
        .ok_or((StatusCode::NOT_FOUND, "session not found".to_string()))?;
    let jobs = session.list_jobs().await.into_iter().map(JobSummary::from).collect();
    Ok(Json(jobs))
}

#[derive(Deserialize)]
pub struct JobSubmitRequest {
    /// Task/tasklet id, at or above `wayfarer_core::ids::RESERVED_MAX`,
    /// dispatched through the 256-slot table.
    pub job_type: u8,
    /// Hex-encoded request body delivered to the agent verbatim.
    #[serde(default)]
    pub body_hex: String,
}

#[derive(Serialize)]
pub struct JobSubmitResponse {
    pub job_id: u16,
}

pub async fn handle_job_submit(
    State(state): State<ApiState>,
    Path(device_hex): Path<String>,
    Json(req): Json<JobSubmitRequest>,
) -> Result<Json<JobSubmitResponse>, (StatusCode, String)> {
    let device = parse_device(&device_hex)?;
    let session = state
        .server
        .sessions
        .get(&device)
        .ok_or((StatusCode::NOT_FOUND, "session not found".to_string()))?;

    let body = hex::decode(&req.body_hex)
        .map_err(|_| (StatusCode::BAD_REQUEST, "invalid hex body".to_string()))?;

    let job_id = session.new_job(req.job_type, now_millis()).await;
    let pkt = Packet::new(req.job_type, device)
        .with_job(job_id)
        .with_body(body);
    session.queue(pkt);

    Ok(Json(JobSubmitResponse { job_id }))
}

#[derive(Serialize)]
pub struct JobCancelResponse {
    pub job_id: u16,
    pub canceled: bool,
}

pub async fn handle_job_cancel(
    State(state): State<ApiState>,
    Path((device_hex, job_id)): Path<(String, u16)>,
) -> Result<Json<JobCancelResponse>, (StatusCode, String)> {
    let device = parse_device(&device_hex)?;
    let session = state
        .server
        .sessions
        .get(&device)
        .ok_or((StatusCode::NOT_FOUND, "session not found".to_string()))?;

    let existed = session
        .list_jobs()
        .await
        .iter()
        .any(|j| j.id == job_id && !j.status.is_terminal());
    session.cancel_job(job_id, now_millis()).await;

    Ok(Json(JobCancelResponse {
        job_id,
        canceled: existed,
    }))
}
