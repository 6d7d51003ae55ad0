//! `/sessions` — session listing, inspection, and drop.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::{parse_device, ApiState};

#[derive(Serialize)]
pub struct SessionSummary {
    pub device: String,
    pub addr: Option<String>,
    pub last_seen_millis: u64,
    pub channel_proxy: bool,
    pub job_count: usize,
}

pub async fn handle_session_list(State(state): State<ApiState>) -> Json<Vec<SessionSummary>> {
    let mut out = Vec::new();
    for entry in state.server.sessions.iter() {
        let session = entry.value();
        out.push(SessionSummary {
            device: hex::encode(entry.key().as_array()),
            addr: session.addr().await,
            last_seen_millis: session.last(),
            channel_proxy: session.state().channel_proxy(),
            job_count: session.job_count().await,
        });
    }
    Json(out)
}

pub async fn handle_session_inspect(
    State(state): State<ApiState>,
    Path(device_hex): Path<String>,
) -> Result<Json<SessionSummary>, (StatusCode, String)> {
    let device = parse_device(&device_hex)?;
    let session = state
        .server
        .sessions
        .get(&device)
        .ok_or((StatusCode::NOT_FOUND, "session not found".to_string()))?;

    Ok(Json(SessionSummary {
        device: hex::encode(device.as_array()),
        addr: session.addr().await,
        last_seen_millis: session.last(),
        channel_proxy: session.state().channel_proxy(),
        job_count: session.job_count().await,
    }))
}

#[derive(Serialize)]
pub struct SessionDropResponse {
    pub device: String,
    pub dropped: bool,
}

pub async fn handle_session_drop(
    State(state): State<ApiState>,
    Path(device_hex): Path<String>,
) -> Result<Json<SessionDropResponse>, (StatusCode, String)> {
    let device = parse_device(&device_hex)?;
    let dropped = match state.server.sessions.remove(&device) {
        Some((_, session)) => {
            session.close();
            true
        }
        None => false,
    };

    if dropped {
        tracing::info!(device = %device, "session dropped via API");
    }

    Ok(Json(SessionDropResponse {
        device: device_hex,
        dropped,
    }))
}
