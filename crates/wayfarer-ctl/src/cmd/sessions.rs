//! Session listing, inspection, and drop commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, delete_json, get_json};

#[derive(Deserialize)]
struct SessionSummary {
    device: String,
    addr: Option<String>,
    last_seen_millis: u64,
    channel_proxy: bool,
    job_count: usize,
}

pub async fn cmd_session_list(port: u16) -> Result<()> {
    let sessions: Vec<SessionSummary> =
        get_json(&format!("{}/sessions", base_url(port))).await?;

    if sessions.is_empty() {
        println!("No active sessions.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Sessions ({})", sessions.len());
    println!("═══════════════════════════════════════");
    for s in &sessions {
        print_summary(s);
    }

    Ok(())
}

pub async fn cmd_session_inspect(port: u16, device_hex: &str) -> Result<()> {
    let s: SessionSummary =
        get_json(&format!("{}/sessions/{}", base_url(port), device_hex)).await?;
    print_summary(&s);
    Ok(())
}

fn print_summary(s: &SessionSummary) {
    println!("  ┌─ {}", s.device);
    println!("  │  addr      : {}", s.addr.as_deref().unwrap_or("unknown"));
    println!("  │  last seen : {} ms ago", s.last_seen_millis);
    println!("  │  proxy     : {}", s.channel_proxy);
    println!("  └─ jobs      : {}", s.job_count);
}

pub async fn cmd_session_drop(port: u16, device_hex: &str) -> Result<()> {
    #[derive(Deserialize)]
    struct DropResponse {
        device: String,
        dropped: bool,
    }

    let resp: DropResponse =
        delete_json(&format!("{}/sessions/{}", base_url(port), device_hex)).await?;

    if resp.dropped {
        println!("✓ Session dropped: {}", resp.device);
    } else {
        println!("Session not found: {}", device_hex);
    }

    Ok(())
}
