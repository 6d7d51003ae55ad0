//! Departing-side handling of an inbound `MIGRATE` packet. The body
//! carries a pipe name; this hands the live session off to the successor
//! process listening on `<name>.<pid_hex>` and reports whether the
//! handoff succeeded.

use std::time::Duration;

use tracing::{error, info, warn};
use wayfarer_core::body::BodyReader;
use wayfarer_core::{Device, Packet};
use wayfarer_session::migration::{self, MigrationFrame, KIND_FULL_MIGRATE};

/// Default XOR key for the migration pipe wrapper when the packet carries
/// no explicit one. The pipe's wrapper key selection is left to the
/// embedder; this workspace's default matches the key
/// `wayfarer-session`'s own migration tests use.
const DEFAULT_PIPE_KEY: &str = "mig";

/// Parse the pipe name out of `pkt.body` and attempt the handoff. Returns
/// `true` if the migration completed and this process should exit.
pub async fn handle_migrate(pkt: &Packet, device: Device, timeout: Duration) -> bool {
    let pipe_name = match BodyReader::new(&pkt.body).read_string() {
        Ok(name) => name,
        Err(e) => {
            warn!(error = %e, "MIGRATE packet body malformed, ignoring");
            return false;
        }
    };

    let path = migration::pipe_path(&pipe_name, std::process::id());
    let frame = MigrationFrame {
        job_id: pkt.job,
        kind: KIND_FULL_MIGRATE,
        profile_bytes: Vec::new(),
        device_id: device,
        proxies: Vec::new(),
    };

    info!(path = %path, "handing off session to successor process");
    match migration::migrate_out(&path, DEFAULT_PIPE_KEY, &frame, timeout).await {
        Ok(()) => {
            info!("migration handoff acknowledged");
            true
        }
        Err(e) => {
            error!(error = %e, "migration handoff failed, continuing in this process");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_core::body::BodyWriter;
    use wayfarer_core::ids;

    fn migrate_packet(pipe_name: &str) -> Packet {
        let mut w = BodyWriter::new();
        w.write_string(pipe_name);
        Packet::new(ids::MIGRATE, Device::derive(b"migrate-test", [0, 0, 0, 1]))
            .with_body(w.into_inner())
    }

    #[tokio::test]
    async fn malformed_body_does_not_migrate() {
        let pkt = Packet::new(ids::MIGRATE, Device::ZERO);
        let migrated = handle_migrate(&pkt, Device::ZERO, Duration::from_millis(50)).await;
        assert!(!migrated);
    }

    #[tokio::test]
    async fn timeout_with_no_peer_does_not_migrate() {
        let pkt = migrate_packet("wf-agent-test-pipe-no-peer");
        let migrated = handle_migrate(&pkt, Device::ZERO, Duration::from_millis(50)).await;
        assert!(!migrated);
    }
}
