//! Proxy relay: terminates sub-agent connections at a pivot and
//! multiplexes them over that pivot's single upstream Session.
//! `tokio::sync::RwLock<HashMap<..>>` for the clients map, bounded `mpsc`
//! for queues and the prune channel. Control flow: unknown-non-hello gets
//! `REGISTER`, `HELLO` allocates state and forwards tagged upstream,
//! `SHUTDOWN` forwards and prunes, everything else forwards and pulls a
//! queued reply.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use wayfarer_core::flags::Flags;
use wayfarer_core::{ids, Device, Packet};

use crate::session::{Session, SEND_QUEUE_CAPACITY};
use crate::state::{self, StateFlags};

/// A stripped-down Session for one sub-agent terminated at this relay:
/// identity, send queue, wake signal, peek slot. No fragment map or job
/// table — those belong to the real Session on the other end of the
/// upstream hop.
pub struct ProxyClient {
    pub id: Device,
    state: StateFlags,
    send_tx: mpsc::Sender<Packet>,
    send_rx: tokio::sync::Mutex<mpsc::Receiver<Packet>>,
    wake_tx: mpsc::Sender<()>,
    wake_rx: tokio::sync::Mutex<mpsc::Receiver<()>>,
    peek: tokio::sync::Mutex<Option<Packet>>,
}

impl ProxyClient {
    fn new(id: Device) -> Arc<ProxyClient> {
        let (send_tx, send_rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
        let (wake_tx, wake_rx) = mpsc::channel(1);
        Arc::new(ProxyClient {
            id,
            state: StateFlags::new(),
            send_tx,
            send_rx: tokio::sync::Mutex::new(send_rx),
            wake_tx,
            wake_rx: tokio::sync::Mutex::new(wake_rx),
            peek: tokio::sync::Mutex::new(None),
        })
    }

    pub fn queue(&self, pkt: Packet) {
        if self.state.send_closed() {
            return;
        }
        let _ = self.send_tx.try_send(pkt);
    }

    pub async fn pick(&self, allow_block: bool) -> Option<Packet> {
        if let Some(p) = self.peek.lock().await.take() {
            return Some(p);
        }
        if let Ok(p) = self.send_rx.lock().await.try_recv() {
            return Some(p);
        }
        if !allow_block {
            return None;
        }
        let mut wake_rx = self.wake_rx.lock().await;
        let mut send_rx = self.send_rx.lock().await;
        tokio::select! {
            _ = wake_rx.recv() => None,
            maybe = send_rx.recv() => maybe,
        }
    }

    pub fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    pub fn close(&self) {
        self.state.set(state::SEND_CLOSE);
        self.state.set(state::CLOSED);
    }
}

/// A node that terminates sub-agent connections and multiplexes them over
/// a single upstream Session. `parent` is itself an ordinary `Session`
/// talking to this relay's controller.
pub struct Proxy {
    pub parent: Arc<Session>,
    clients: RwLock<HashMap<Device, Arc<ProxyClient>>>,
    prune_tx: mpsc::Sender<Device>,
    prune_rx: tokio::sync::Mutex<Option<mpsc::Receiver<Device>>>,
}

impl Proxy {
    pub fn new(parent: Arc<Session>) -> Arc<Proxy> {
        let (prune_tx, prune_rx) = mpsc::channel(256);
        Arc::new(Proxy {
            parent,
            clients: RwLock::new(HashMap::new()),
            prune_tx,
            prune_rx: tokio::sync::Mutex::new(Some(prune_rx)),
        })
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Handle one inbound sub-agent exchange, returning the single packet
    /// to reply downstream with.
    pub async fn handle_sub_exchange(&self, inbound: Packet) -> Packet {
        let known = self.clients.read().await.contains_key(&inbound.device);

        if !known && inbound.id != ids::HELLO {
            return register_reply(&inbound);
        }

        if inbound.id == ids::HELLO {
            let client = ProxyClient::new(inbound.device);
            self.clients.write().await.insert(inbound.device, client);
            self.forward_upstream(&inbound);
            return Packet::new(ids::COMPLETE, inbound.device).with_job(inbound.job);
        }

        if inbound.id == ids::SHUTDOWN {
            self.forward_upstream(&inbound);
            let _ = self.prune_tx.try_send(inbound.device);
            return Packet::new(ids::SHUTDOWN, inbound.device).with_job(inbound.job);
        }

        let client = {
            let clients = self.clients.read().await;
            clients.get(&inbound.device).cloned()
        };
        let Some(client) = client else {
            return register_reply(&inbound);
        };

        self.forward_upstream(&inbound);
        client
            .pick(false)
            .await
            .unwrap_or_else(|| Packet::new(ids::PING, inbound.device))
    }

    fn forward_upstream(&self, inbound: &Packet) {
        let mut tagged = inbound.clone();
        tagged.flags.set(Flags::PROXY);
        tagged.tags.push(inbound.device.hash32());
        self.parent.queue(tagged);
    }

    /// Deliver a packet arriving from upstream to whichever sub-agent its
    /// tags name. Returns `true` if a matching ProxyClient was found.
    pub async fn route_downstream(&self, pkt: Packet) -> bool {
        let clients = self.clients.read().await;
        for client in clients.values() {
            if pkt.tags.contains(&client.id.hash32()) {
                client.queue(pkt);
                return true;
            }
        }
        false
    }

    /// Drains the prune channel and deletes entries. Runs for the life
    /// of the Proxy.
    pub async fn run_pruner(self: Arc<Self>) {
        let mut rx = match self.prune_rx.lock().await.take() {
            Some(rx) => rx,
            None => return,
        };
        while let Some(id) = rx.recv().await {
            self.clients.write().await.remove(&id);
        }
    }
}

fn register_reply(inbound: &Packet) -> Packet {
    let mut reply = Packet::new(ids::REGISTER, inbound.device).with_job(inbound.job);
    if inbound.flags.frag() {
        let mut flags = Flags::empty().with(Flags::FRAG);
        flags.set_group(inbound.flags.group());
        flags.set_len(inbound.flags.len_field());
        flags.set_position(inbound.flags.position());
        reply = reply.with_flags(flags);
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use wayfarer_core::config::ProfileConfig;
    use wayfarer_transport::tcp::TcpTransport;
    use wayfarer_transport::Transport;

    fn parent_session() -> StdArc<Session> {
        let cfg = ProfileConfig {
            hosts: vec!["127.0.0.1:0".to_string()],
            ..ProfileConfig::default()
        };
        let transport: StdArc<dyn Transport> = StdArc::new(TcpTransport);
        let profile = StdArc::new(crate::profile::Profile::new(&cfg, transport).unwrap());
        Session::new(Device::derive(b"proxy-parent", [0, 0, 0, 9]), profile)
    }

    fn sub_device(salt: u8) -> Device {
        Device::derive(b"sub-agent", [0, 0, 0, salt])
    }

    #[tokio::test]
    async fn unknown_non_hello_gets_register() {
        let proxy = Proxy::new(parent_session());
        let inbound = Packet::new(0xC0, sub_device(1));
        let reply = proxy.handle_sub_exchange(inbound).await;
        assert_eq!(reply.id, ids::REGISTER);
    }

    #[tokio::test]
    async fn register_preserves_fragment_hint() {
        let proxy = Proxy::new(parent_session());
        let mut inbound = Packet::new(0xC0, sub_device(1));
        inbound.flags = Flags::empty().with(Flags::FRAG);
        inbound.flags.set_group(7);
        inbound.flags.set_len(4);
        inbound.flags.set_position(2);
        let reply = proxy.handle_sub_exchange(inbound).await;
        assert_eq!(reply.id, ids::REGISTER);
        assert!(reply.flags.frag());
        assert_eq!(reply.flags.group(), 7);
        assert_eq!(reply.flags.position(), 2);
    }

    #[tokio::test]
    async fn hello_allocates_client_and_forwards_tagged_upstream() {
        let parent = parent_session();
        let proxy = Proxy::new(parent.clone());
        let hello = Packet::new(ids::HELLO, sub_device(2));
        let reply = proxy.handle_sub_exchange(hello).await;
        assert_eq!(reply.id, ids::COMPLETE);
        assert_eq!(proxy.client_count().await, 1);

        let forwarded = parent.pick(false).await.unwrap();
        assert!(forwarded.flags.proxy());
        assert_eq!(forwarded.tags, vec![sub_device(2).hash32()]);
    }

    #[tokio::test]
    async fn shutdown_forwards_and_prunes() {
        let parent = parent_session();
        let proxy = Proxy::new(parent.clone());
        proxy.handle_sub_exchange(Packet::new(ids::HELLO, sub_device(3))).await;
        let _ = parent.pick(false).await;

        let reply = proxy
            .handle_sub_exchange(Packet::new(ids::SHUTDOWN, sub_device(3)))
            .await;
        assert_eq!(reply.id, ids::SHUTDOWN);

        let pruner = Arc::clone(&proxy).run_pruner();
        tokio::spawn(pruner);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(proxy.client_count().await, 0);
    }

    #[tokio::test]
    async fn preserves_per_sub_agent_ordering() {
        let parent = parent_session();
        let proxy = Proxy::new(parent.clone());
        proxy.handle_sub_exchange(Packet::new(ids::HELLO, sub_device(4))).await;
        let _ = parent.pick(false).await;

        proxy
            .handle_sub_exchange(Packet::new(0xC1, sub_device(4)).with_body(b"a1".to_vec()))
            .await;
        proxy
            .handle_sub_exchange(Packet::new(0xC1, sub_device(4)).with_body(b"a2".to_vec()))
            .await;

        let first = parent.pick(false).await.unwrap();
        let second = parent.pick(false).await.unwrap();
        assert_eq!(first.body, b"a1");
        assert_eq!(second.body, b"a2");
    }
}
