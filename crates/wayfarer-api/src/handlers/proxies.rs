//! `/proxies` — active proxy relay listing.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;

#[derive(Serialize)]
pub struct ProxySummary {
    pub pivot_device: String,
    pub client_count: usize,
}

pub async fn handle_proxy_list(State(state): State<ApiState>) -> Json<Vec<ProxySummary>> {
    let proxies = state
        .server
        .proxy_snapshot()
        .await
        .into_iter()
        .map(|(device, client_count)| ProxySummary {
            pivot_device: hex::encode(device.as_array()),
            client_count,
        })
        .collect();
    Json(proxies)
}
