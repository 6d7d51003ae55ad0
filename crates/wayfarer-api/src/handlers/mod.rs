//! HTTP API handlers — exposes the running `wayfarerd` Server as JSON
//! over an operator-facing HTTP control surface.

pub mod events;
pub mod jobs;
pub mod proxies;
pub mod sessions;
pub mod status;

use std::sync::Arc;

use axum::http::StatusCode;

use wayfarer_core::Device;
use wayfarer_server::Server;

#[derive(Clone)]
pub struct ApiState {
    pub server: Arc<Server>,
}

/// Parse a hex-encoded 32-byte device identifier.
fn parse_device(hex_str: &str) -> Result<Device, (StatusCode, String)> {
    let bytes =
        hex::decode(hex_str).map_err(|_| (StatusCode::BAD_REQUEST, "invalid hex".to_string()))?;
    if bytes.len() != wayfarer_core::device::DEVICE_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("device id must be {} bytes", wayfarer_core::device::DEVICE_LEN),
        ));
    }
    let mut arr = [0u8; wayfarer_core::device::DEVICE_LEN];
    arr.copy_from_slice(&bytes);
    Ok(Device::from_bytes(arr))
}

// Re-export handler functions for use in router setup.
pub use events::handle_events_tail;
pub use jobs::{handle_job_cancel, handle_job_list, handle_job_submit};
pub use proxies::handle_proxy_list;
pub use sessions::{handle_session_drop, handle_session_inspect, handle_session_list};
pub use status::handle_status;
