use crate::*;
use wayfarer_core::flags::Flags;

/// A pivot agent forwards a `PROXY`-flagged sub-agent `HELLO`; the server
/// lazily creates a `Proxy` for that pivot, replies with the sub-agent's
/// `COMPLETE` on the pivot's next outbound turn, and the relay shows up in
/// the operator-facing snapshot.
#[tokio::test]
async fn sub_agent_hello_is_relayed_and_answered_on_the_next_turn() {
    let (server, addr) = spawn_server().await;
    let mut conn = connect(&addr).await;
    let pivot = Device::derive(b"integration-proxy-pivot", [0, 0, 0, 1]);
    let sub = Device::derive(b"integration-proxy-sub", [0, 0, 0, 2]);
    handshake(conn.as_mut(), pivot).await;

    let _keepalive = read_packet(conn.as_mut()).await;
    let mut sub_hello = Packet::new(ids::HELLO, sub);
    sub_hello.flags.set(Flags::PROXY);
    write_packet(conn.as_mut(), &sub_hello).await;

    let reply = read_packet(conn.as_mut()).await;
    assert_eq!(reply.id, ids::COMPLETE);
    assert_eq!(reply.device, sub);
    write_packet(conn.as_mut(), &Packet::new(ids::PING, pivot)).await;

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let proxies = server.proxy_snapshot().await;
    assert_eq!(proxies.len(), 1);
    assert_eq!(proxies[0].0, pivot);
    assert_eq!(proxies[0].1, 1);
}

/// A `PROXY`-flagged `SHUTDOWN` from an already-registered sub-agent is
/// forwarded upstream and prunes that sub-agent's `ProxyClient`, without
/// tearing down the pivot's own session.
#[tokio::test]
async fn sub_agent_shutdown_prunes_without_closing_the_pivot_session() {
    let (server, addr) = spawn_server().await;
    let mut conn = connect(&addr).await;
    let pivot = Device::derive(b"integration-proxy-pivot", [0, 0, 0, 3]);
    let sub = Device::derive(b"integration-proxy-sub", [0, 0, 0, 4]);
    handshake(conn.as_mut(), pivot).await;

    let _keepalive = read_packet(conn.as_mut()).await;
    let mut sub_hello = Packet::new(ids::HELLO, sub);
    sub_hello.flags.set(Flags::PROXY);
    write_packet(conn.as_mut(), &sub_hello).await;
    let _sub_complete = read_packet(conn.as_mut()).await;

    write_packet(conn.as_mut(), &Packet::new(ids::PING, pivot)).await;
    let mut sub_shutdown = Packet::new(ids::SHUTDOWN, sub);
    sub_shutdown.flags.set(Flags::PROXY);
    let _pivot_keepalive = read_packet(conn.as_mut()).await;
    write_packet(conn.as_mut(), &sub_shutdown).await;
    let reply = read_packet(conn.as_mut()).await;
    assert_eq!(reply.id, ids::SHUTDOWN);
    assert_eq!(reply.device, sub);

    write_packet(conn.as_mut(), &Packet::new(ids::PING, pivot)).await;
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    assert_eq!(server.session_count().await, 1);
    let proxies = server.proxy_snapshot().await;
    assert_eq!(proxies[0].1, 0);
}
