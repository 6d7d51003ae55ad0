//! `/status` — aggregate daemon counts.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub sessions: usize,
    pub proxies: usize,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let sessions = state.server.session_count().await;
    let proxies = state.server.proxy_snapshot().await.len();
    Json(StatusResponse { sessions, proxies })
}
