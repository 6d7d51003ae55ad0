//! Connection exchange turn: one outbound packet, one inbound packet, over
//! an already-connected `Conn` — a single request/response pair per wake,
//! never a persistent duplex stream.

use wayfarer_core::{ids, CoreError, Packet};
use wayfarer_transport::{Conn, Transform, Wrapper};

use crate::session::Session;

/// Run one exchange turn: pick (or synthesize a keepalive) outbound
/// packet, wrap/transform/write it, then read/unwrap/detransform/decode
/// the reply and hand it to [`Session::ingest`]. Holds `transport_busy`
/// for the duration, enforcing at-most-one concurrent exchange per
/// connection.
pub async fn run_exchange(
    conn: &mut dyn Conn,
    session: &Session,
    wrapper: &dyn Wrapper,
    transform: &dyn Transform,
    max_body_len: usize,
) -> Result<Vec<Packet>, CoreError> {
    let _busy = session.transport_busy.lock().await;

    let outbound = session
        .next(max_body_len)
        .await
        .unwrap_or_else(|| Packet::new(ids::PING, session.id));
    let encoded = outbound.encode_to_vec()?;
    let transformed = transform.encode(&encoded)?;
    let wrapped = wrapper.wrap(&transformed)?;
    conn.write_frame(&wrapped).await?;

    let inbound_wrapped = conn.read_frame().await?;
    let inbound_transformed = wrapper.unwrap(&inbound_wrapped)?;
    let inbound_bytes = transform.decode(&inbound_transformed)?;
    let inbound = Packet::decode(&inbound_bytes)?;

    if inbound.flags.channel_end() {
        session.close_channel().await;
    } else if inbound.flags.channel() {
        session.open_channel().await;
    }

    Ok(session.ingest(inbound).await)
}
