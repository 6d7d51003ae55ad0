use crate::*;

#[tokio::test]
async fn hello_establishes_session_and_server_sees_it() {
    let (server, addr) = spawn_server().await;
    let mut conn = connect(&addr).await;
    let device = Device::derive(b"integration-handshake", [0, 0, 0, 1]);

    let reply = handshake(conn.as_mut(), device).await;
    assert_eq!(reply.id, ids::COMPLETE);
    assert_eq!(server.session_count().await, 1);
}

#[tokio::test]
async fn unknown_device_non_hello_is_rejected_with_register() {
    let (_server, addr) = spawn_server().await;
    let mut conn = connect(&addr).await;
    let device = Device::derive(b"integration-handshake", [0, 0, 0, 2]);

    write_packet(conn.as_mut(), &Packet::new(0xC0, device)).await;
    let reply = read_packet(conn.as_mut()).await;
    assert_eq!(reply.id, ids::REGISTER);
}

#[tokio::test]
async fn idle_session_is_paced_with_keepalive_pings() {
    let (_server, addr) = spawn_server().await;
    let mut conn = connect(&addr).await;
    let device = Device::derive(b"integration-handshake", [0, 0, 0, 3]);
    handshake(conn.as_mut(), device).await;

    let outbound = read_packet(conn.as_mut()).await;
    assert!(outbound.is_noop_ping());

    // Answer so the server's exchange turn completes cleanly.
    write_packet(conn.as_mut(), &Packet::new(ids::PING, device)).await;
}

#[tokio::test]
async fn two_agents_each_get_their_own_session() {
    let (server, addr) = spawn_server().await;
    let mut conn_a = connect(&addr).await;
    let mut conn_b = connect(&addr).await;
    let device_a = Device::derive(b"integration-handshake-a", [0, 0, 0, 1]);
    let device_b = Device::derive(b"integration-handshake-b", [0, 0, 0, 1]);

    handshake(conn_a.as_mut(), device_a).await;
    handshake(conn_b.as_mut(), device_b).await;

    assert_eq!(server.session_count().await, 2);
    assert!(server.sessions.contains_key(&device_a));
    assert!(server.sessions.contains_key(&device_b));
}
