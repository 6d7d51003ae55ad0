//! wayfarerd — the session protocol engine's server process.

use std::sync::Arc;

use anyhow::Result;
use wayfarer_core::config::WayfarerConfig;
use wayfarer_session::Profile;
use wayfarer_server::Server;
use wayfarer_transport::tcp::TcpTransport;
use wayfarer_transport::Transport;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = WayfarerConfig::load()?;
    cfg.write_default_if_missing()?;

    tracing::info!(
        listeners = cfg.listeners.len(),
        event_channel_capacity = cfg.event_channel_capacity,
        "wayfarerd starting"
    );

    let transport: Arc<dyn Transport> = Arc::new(TcpTransport);
    let profile = Arc::new(Profile::new(&cfg.profile, transport.clone())?);
    let server = Server::new(profile, cfg.event_channel_capacity);

    let mut tasks = Vec::new();
    for listen_cfg in &cfg.listeners {
        let server = server.clone();
        let transport = transport.clone();
        let listen_cfg = listen_cfg.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.run_listener(listen_cfg, transport).await {
                tracing::error!(error = %e, "listener task exited");
            }
        }));
    }

    if tasks.is_empty() {
        tracing::warn!("no listeners configured, wayfarerd has nothing to accept");
        std::future::pending::<()>().await;
    }

    for t in tasks {
        let _ = t.await;
    }

    Ok(())
}
