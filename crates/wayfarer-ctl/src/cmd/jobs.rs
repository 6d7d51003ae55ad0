//! Job listing, submission, and cancellation commands.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::http::{base_url, delete_json, get_json, post_json_body};

#[derive(Deserialize)]
struct JobSummary {
    id: u16,
    job_type: u8,
    status: String,
    start_millis: u64,
    complete_millis: Option<u64>,
    error: Option<String>,
}

pub async fn cmd_job_list(port: u16, device_hex: &str) -> Result<()> {
    let jobs: Vec<JobSummary> =
        get_json(&format!("{}/sessions/{}/jobs", base_url(port), device_hex)).await?;

    if jobs.is_empty() {
        println!("No jobs for session {}.", device_hex);
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Jobs ({})", jobs.len());
    println!("═══════════════════════════════════════");
    for j in &jobs {
        println!("  ┌─ job {:#06x} ({})", j.id, j.job_type);
        println!("  │  status   : {}", j.status);
        println!("  │  started  : {} ms", j.start_millis);
        if let Some(c) = j.complete_millis {
            println!("  │  complete : {} ms", c);
        }
        if let Some(e) = &j.error {
            println!("  └─ error    : {}", e);
        } else {
            println!("  └─");
        }
    }

    Ok(())
}

pub async fn cmd_job_submit(port: u16, device_hex: &str, job_type: u8, body_hex: &str) -> Result<()> {
    #[derive(Serialize)]
    struct SubmitRequest<'a> {
        job_type: u8,
        body_hex: &'a str,
    }

    #[derive(Deserialize)]
    struct SubmitResponse {
        job_id: u16,
    }

    let resp: SubmitResponse = post_json_body(
        &format!("{}/sessions/{}/jobs", base_url(port), device_hex),
        &SubmitRequest { job_type, body_hex },
    )
    .await?;

    println!("Submitted job {:#06x}", resp.job_id);
    Ok(())
}

pub async fn cmd_job_cancel(port: u16, device_hex: &str, job_id: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct CancelResponse {
        job_id: u16,
        canceled: bool,
    }

    let resp: CancelResponse = delete_json(&format!(
        "{}/sessions/{}/jobs/{}",
        base_url(port),
        device_hex,
        job_id
    ))
    .await?;

    if resp.canceled {
        println!("✓ Canceled job {:#06x}", resp.job_id);
    } else {
        println!("Job not found or already terminal: {:#06x}", resp.job_id);
    }

    Ok(())
}
