use crate::*;
use wayfarer_core::flags::Flags;

/// Splits a logical `SHUTDOWN` packet across two wire turns; the server's
/// `Cluster` reassembly must stitch the fragments back into one packet
/// before the builtin-id handling in `Server::handle_conn` sees it.
#[tokio::test]
async fn fragmented_shutdown_reassembles_before_dispatch() {
    let (server, addr) = spawn_server().await;
    let mut conn = connect(&addr).await;
    let device = Device::derive(b"integration-fragmentation", [0, 0, 0, 1]);
    handshake(conn.as_mut(), device).await;
    assert_eq!(server.session_count().await, 1);

    let _keepalive = read_packet(conn.as_mut()).await;
    let mut frag1 = Packet::new(ids::SHUTDOWN, device).with_body(b"BBB".to_vec());
    frag1.flags = Flags::empty().with(Flags::FRAG);
    frag1.flags.set_group(1);
    frag1.flags.set_len(2);
    frag1.flags.set_position(1);
    write_packet(conn.as_mut(), &frag1).await;

    let _keepalive2 = read_packet(conn.as_mut()).await;
    let mut frag0 = Packet::new(ids::SHUTDOWN, device).with_body(b"AAA".to_vec());
    frag0.flags = Flags::empty().with(Flags::FRAG);
    frag0.flags.set_group(1);
    frag0.flags.set_len(2);
    frag0.flags.set_position(0);
    write_packet(conn.as_mut(), &frag0).await;

    // The second fragment completes the group; the server sees a plain
    // SHUTDOWN and tears the session down without answering this turn.
    assert!(conn.read_frame().await.is_err());
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(server.session_count().await, 0);
}

/// A non-builtin reassembled id with no registered dispatch slot is
/// silently dropped, and the connection stays open for the next keepalive
/// turn.
#[tokio::test]
async fn fragmented_unregistered_task_id_is_dropped_without_breaking_the_session() {
    let (server, addr) = spawn_server().await;
    let mut conn = connect(&addr).await;
    let device = Device::derive(b"integration-fragmentation", [0, 0, 0, 2]);
    handshake(conn.as_mut(), device).await;

    let _keepalive = read_packet(conn.as_mut()).await;
    let mut frag0 = Packet::new(0xC0, device).with_body(b"he".to_vec());
    frag0.flags = Flags::empty().with(Flags::FRAG);
    frag0.flags.set_group(2);
    frag0.flags.set_len(2);
    frag0.flags.set_position(0);
    write_packet(conn.as_mut(), &frag0).await;

    let _keepalive2 = read_packet(conn.as_mut()).await;
    let mut frag1 = Packet::new(0xC0, device).with_body(b"llo".to_vec());
    frag1.flags = Flags::empty().with(Flags::FRAG);
    frag1.flags.set_group(2);
    frag1.flags.set_len(2);
    frag1.flags.set_position(1);
    write_packet(conn.as_mut(), &frag1).await;

    // Nothing crashed, the session is still alive for a further turn.
    let _keepalive3 = read_packet(conn.as_mut()).await;
    write_packet(conn.as_mut(), &Packet::new(ids::PING, device)).await;
    assert_eq!(server.session_count().await, 1);
}
