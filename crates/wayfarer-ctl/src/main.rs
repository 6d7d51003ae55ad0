//! wayfarer-ctl — command-line interface for the wayfarerd operator API.

use anyhow::{Context, Result};

mod cmd;

const DEFAULT_PORT: u16 = 9001;

fn print_usage() {
    println!("Usage: wayfarer-ctl [--port <port>] <command>");
    println!();
    println!("Daemon");
    println!("  status                            Session and proxy summary");
    println!();
    println!("Sessions");
    println!("  sessions                          List connected sessions");
    println!("  sessions inspect <device>         Show detailed session info");
    println!("  sessions drop <device>            Drop a session");
    println!();
    println!("Jobs");
    println!("  jobs <device>                     List jobs for a session");
    println!("  jobs submit <device> <type> <hex> Submit a job (type: u8, body: hex)");
    println!("  jobs cancel <device> <job_id>     Cancel a pending job");
    println!();
    println!("Proxies");
    println!("  proxies                           List active proxy relays");
    println!();
    println!(
        "Options:\n  --port <port>                     API port (default: {})",
        DEFAULT_PORT
    );
    println!();
    println!("Examples:");
    println!("  wayfarer-ctl status");
    println!("  wayfarer-ctl sessions");
    println!("  wayfarer-ctl jobs 5c8c7d3c9eff6572...");
    println!("  wayfarer-ctl jobs submit 5c8c7d3c... 40 0a0b0c");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(args[i].clone());
        }
        i += 1;
    }

    let r: Vec<&str> = remaining.iter().map(|s| s.as_str()).collect();

    match r.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["sessions"] => cmd::sessions::cmd_session_list(port).await,
        ["sessions", "inspect", device] => cmd::sessions::cmd_session_inspect(port, device).await,
        ["sessions", "drop", device] => cmd::sessions::cmd_session_drop(port, device).await,
        ["jobs", device] => cmd::jobs::cmd_job_list(port, device).await,
        ["jobs", "submit", device, job_type, body_hex] => {
            let job_type: u8 = job_type.parse().context("job type must be a u8")?;
            cmd::jobs::cmd_job_submit(port, device, job_type, body_hex).await
        }
        ["jobs", "cancel", device, job_id] => {
            let job_id: u16 = job_id.parse().context("job id must be a u16")?;
            cmd::jobs::cmd_job_cancel(port, device, job_id).await
        }
        ["proxies"] => cmd::proxies::cmd_proxy_list(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
