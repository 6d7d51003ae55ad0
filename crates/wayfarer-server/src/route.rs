//! Top-level session routing: HELLO/REGISTER/SHUTDOWN handling for the
//! primary agent connection (as opposed to [`crate::dispatch`]'s task
//! slots or `wayfarer_session::proxy`'s sub-agent routing).

use std::sync::Arc;

use tokio::sync::broadcast;
use wayfarer_core::flags::Flags;
use wayfarer_core::{ids, Packet};
use wayfarer_session::{Profile, Session, SessionTable};

use crate::ServerEvent;

/// Build a REGISTER reply for an unrecognized device, preserving the
/// inbound fragment hint (group/len/position) so a fragmented probe isn't
/// mistaken for a fresh single-frame one on the sender's next turn.
fn register_reply(pkt: &Packet) -> Packet {
    let mut reply = Packet::new(ids::REGISTER, pkt.device).with_job(pkt.job);
    if pkt.flags.frag() {
        let mut flags = Flags::empty().with(Flags::FRAG);
        flags.set_group(pkt.flags.group());
        flags.set_len(pkt.flags.len_field());
        flags.set_position(pkt.flags.position());
        reply = reply.with_flags(flags);
    }
    reply
}

/// Handle one inbound packet on a connection with no Session resolved
/// yet (or one whose device is not yet known to `sessions`). Returns the
/// single reply packet to write back immediately.
pub async fn route_inbound(
    sessions: &SessionTable,
    profile: &Arc<Profile>,
    pkt: Packet,
    peer_addr: &str,
    events: &broadcast::Sender<ServerEvent>,
) -> Packet {
    let known = sessions.contains_key(&pkt.device);

    if !known && pkt.id != ids::HELLO {
        return register_reply(&pkt);
    }

    if pkt.id == ids::HELLO {
        let session = Session::new(pkt.device, profile.clone());
        session.set_addr(peer_addr.to_string()).await;
        sessions.insert(pkt.device, session);
        let _ = events.send(ServerEvent::SessionEstablished {
            device: pkt.device,
            addr: peer_addr.to_string(),
        });
        return Packet::new(ids::COMPLETE, pkt.device).with_job(pkt.job);
    }

    if pkt.id == ids::SHUTDOWN {
        if let Some((_, session)) = sessions.remove(&pkt.device) {
            session.close();
        }
        let _ = events.send(ServerEvent::SessionClosed { device: pkt.device });
        return Packet::new(ids::SHUTDOWN, pkt.device).with_job(pkt.job);
    }

    register_reply(&pkt)
}
