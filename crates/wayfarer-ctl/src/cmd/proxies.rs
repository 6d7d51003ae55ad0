//! Proxy relay listing command.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct ProxySummary {
    pivot_device: String,
    client_count: usize,
}

pub async fn cmd_proxy_list(port: u16) -> Result<()> {
    let proxies: Vec<ProxySummary> = get_json(&format!("{}/proxies", base_url(port))).await?;

    if proxies.is_empty() {
        println!("No active proxy relays.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Proxy Relays ({})", proxies.len());
    println!("═══════════════════════════════════════");
    for p in &proxies {
        println!("  ┌─ pivot {}", p.pivot_device);
        println!("  └─ sub-agents: {}", p.client_count);
    }

    Ok(())
}
