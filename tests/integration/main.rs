//! End-to-end tests driving a real `wayfarer-server` `Server` over loopback
//! TCP, exercising the same wire path a real agent would: handshake,
//! fragment reassembly, proxy relay, and session teardown.

use std::sync::Arc;
use std::time::Duration;

use wayfarer_core::config::{ListenConfig, ProfileConfig};
use wayfarer_core::{ids, Device, Packet};
use wayfarer_server::Server;
use wayfarer_session::Profile;
use wayfarer_transport::tcp::TcpTransport;
use wayfarer_transport::{Conn, Transport};

mod fragmentation;
mod handshake;
mod proxy;
mod shutdown;

async fn free_addr() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    format!("127.0.0.1:{}", listener.local_addr().unwrap().port())
}

fn server_profile() -> Arc<Profile> {
    let cfg = ProfileConfig {
        hosts: vec!["127.0.0.1:0".to_string()],
        ..ProfileConfig::default()
    };
    let transport: Arc<dyn Transport> = Arc::new(TcpTransport);
    Arc::new(Profile::new(&cfg, transport).unwrap())
}

/// Spin up a real `Server` bound to a loopback address with identity
/// wrapping and no transform, and return it alongside the address agents
/// should dial.
async fn spawn_server() -> (Arc<Server>, String) {
    let server = Server::new(server_profile(), 64);
    let bind = free_addr().await;
    let listen_cfg = ListenConfig {
        bind: bind.clone(),
        wrapper: "identity".to_string(),
        wrapper_key: None,
        transform: "none".to_string(),
    };
    let transport: Arc<dyn Transport> = Arc::new(TcpTransport);
    let server_for_task = server.clone();
    tokio::spawn(async move {
        let _ = server_for_task.run_listener(listen_cfg, transport).await;
    });
    // Give the listener a moment to bind before the first connect attempt.
    tokio::time::sleep(Duration::from_millis(50)).await;
    (server, bind)
}

async fn connect(addr: &str) -> Box<dyn Conn> {
    TcpTransport.connect(addr).await.unwrap()
}

async fn handshake(conn: &mut dyn Conn, device: Device) -> Packet {
    write_packet(conn, &Packet::new(ids::HELLO, device)).await;
    read_packet(conn).await
}

async fn read_packet(conn: &mut dyn Conn) -> Packet {
    let raw = conn.read_frame().await.unwrap();
    Packet::decode(&raw).unwrap()
}

async fn write_packet(conn: &mut dyn Conn, pkt: &Packet) {
    conn.write_frame(&pkt.encode_to_vec().unwrap()).await.unwrap();
}
