//! Daemon status summary.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct StatusResponse {
    sessions: usize,
    proxies: usize,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  wayfarerd Status");
    println!("═══════════════════════════════════════");
    println!("  Active sessions : {}", resp.sessions);
    println!("  Active proxies  : {}", resp.proxies);

    Ok(())
}
