use crate::*;

/// A plain (non-fragmented) `SHUTDOWN` mid-session closes the connection and
/// removes the session from the server's table, mirroring the unit-level
/// behavior already covered for `route_inbound`'s first-frame path.
#[tokio::test]
async fn shutdown_closes_connection_and_drops_session() {
    let (server, addr) = spawn_server().await;
    let mut conn = connect(&addr).await;
    let device = Device::derive(b"integration-shutdown", [0, 0, 0, 1]);
    handshake(conn.as_mut(), device).await;
    assert_eq!(server.session_count().await, 1);

    let _keepalive = read_packet(conn.as_mut()).await;
    write_packet(conn.as_mut(), &Packet::new(ids::SHUTDOWN, device)).await;

    assert!(conn.read_frame().await.is_err());
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(server.session_count().await, 0);
    assert!(!server.sessions.contains_key(&device));
}

/// Shutting down one agent's session has no effect on another agent's live
/// session on the same server.
#[tokio::test]
async fn shutdown_of_one_agent_leaves_others_untouched() {
    let (server, addr) = spawn_server().await;
    let mut conn_a = connect(&addr).await;
    let mut conn_b = connect(&addr).await;
    let device_a = Device::derive(b"integration-shutdown-a", [0, 0, 0, 1]);
    let device_b = Device::derive(b"integration-shutdown-b", [0, 0, 0, 1]);
    handshake(conn_a.as_mut(), device_a).await;
    handshake(conn_b.as_mut(), device_b).await;
    assert_eq!(server.session_count().await, 2);

    let _keepalive = read_packet(conn_a.as_mut()).await;
    write_packet(conn_a.as_mut(), &Packet::new(ids::SHUTDOWN, device_a)).await;
    assert!(conn_a.read_frame().await.is_err());

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(server.session_count().await, 1);
    assert!(!server.sessions.contains_key(&device_a));
    assert!(server.sessions.contains_key(&device_b));
}
