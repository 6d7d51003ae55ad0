//! `Server`: owns the session table, the listeners, and the bounded
//! operator event channel. One task per long-lived concern, `tracing`
//! spans per connection.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;
use tracing::{info, warn};
use dashmap::DashMap;
use wayfarer_core::config::ListenConfig;
use wayfarer_core::{ids, Device, Packet};
use wayfarer_session::{new_session_table, run_exchange, Profile, Proxy, Session, SessionTable};
use wayfarer_transport::{wrapper::wrapper_by_name, Conn, Listener, Transform, Wrapper};

use crate::dispatch::DispatchTable;
use crate::route::route_inbound;

/// Frames above this body size are split by the sender; the server never
/// needs to bundle outbound packets larger than this on its own turn.
pub const MAX_BODY_LEN: usize = 48 * 1024;

/// Operator-facing events, fanned out to `wayfarer-api`. The channel drops
/// the oldest event on a slow subscriber rather than blocking session
/// tasks.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    SessionEstablished { device: Device, addr: String },
    SessionClosed { device: Device },
    JobCompleted { device: Device, job: u16 },
}

pub struct Server {
    pub sessions: SessionTable,
    pub dispatch: DispatchTable,
    pub profile: Arc<Profile>,
    /// One relay per pivot agent that has forwarded at least one
    /// `PROXY`-flagged sub-exchange, keyed by the pivot's own device id.
    proxies: DashMap<Device, Arc<Proxy>>,
    events_tx: broadcast::Sender<ServerEvent>,
}

impl Server {
    pub fn new(profile: Arc<Profile>, event_channel_capacity: usize) -> Arc<Server> {
        let (events_tx, _) = broadcast::channel(event_channel_capacity);
        Arc::new(Server {
            sessions: new_session_table(),
            dispatch: DispatchTable::new(),
            profile,
            proxies: DashMap::new(),
            events_tx,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ServerEvent> {
        self.events_tx.subscribe()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot of active proxy relays for the operator API: pivot device
    /// and its current sub-agent client count.
    pub async fn proxy_snapshot(&self) -> Vec<(Device, usize)> {
        let mut out = Vec::new();
        for entry in self.proxies.iter() {
            out.push((*entry.key(), entry.value().client_count().await));
        }
        out
    }

    fn get_or_create_proxy(&self, device: Device, session: &Arc<Session>) -> Arc<Proxy> {
        self.proxies
            .entry(device)
            .or_insert_with(|| {
                let proxy = Proxy::new(session.clone());
                tokio::spawn(Arc::clone(&proxy).run_pruner());
                proxy
            })
            .clone()
    }

    /// Bind `listen_cfg` and accept connections forever, spawning one task
    /// per connection.
    pub async fn run_listener(
        self: Arc<Self>,
        listen_cfg: ListenConfig,
        transport: Arc<dyn wayfarer_transport::Transport>,
    ) -> Result<(), wayfarer_core::CoreError> {
        let mut listener = transport.listen(&listen_cfg.bind).await?;
        info!(bind = %listen_cfg.bind, wrapper = %listen_cfg.wrapper, "listening");
        loop {
            let conn = match listener.accept().await {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let server = self.clone();
            let wrapper_name = listen_cfg.wrapper.clone();
            let wrapper_key = listen_cfg.wrapper_key.clone();
            let transform_name = listen_cfg.transform.clone();
            tokio::spawn(async move {
                server
                    .handle_conn(conn, wrapper_name, wrapper_key, transform_name)
                    .await;
            });
        }
    }

    async fn handle_conn(
        self: Arc<Self>,
        mut conn: Box<dyn Conn>,
        wrapper_name: String,
        wrapper_key: Option<String>,
        transform_name: String,
    ) {
        let wrapper = match wrapper_by_name(&wrapper_name, wrapper_key.as_deref()) {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "failed to construct listener wrapper");
                return;
            }
        };
        let transform = match wayfarer_transport::transform::transform_by_name(&transform_name) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "failed to construct listener transform");
                return;
            }
        };

        let first_frame = match conn.read_frame().await {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "failed to read handshake frame");
                return;
            }
        };
        let unwrapped = match wrapper.unwrap(&first_frame).and_then(|b| transform.decode(&b)) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to unwrap handshake frame");
                return;
            }
        };
        let pkt = match Packet::decode(&unwrapped) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "malformed handshake packet");
                return;
            }
        };

        let device = pkt.device;
        let reply = route_inbound(&self.sessions, &self.profile, pkt, "unknown", &self.events_tx).await;
        let encoded = match reply
            .encode_to_vec()
            .and_then(|b| transform.encode(&b))
            .and_then(|b| wrapper.wrap(&b))
        {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to encode handshake reply");
                return;
            }
        };
        if let Err(e) = conn.write_frame(&encoded).await {
            warn!(error = %e, "failed to write handshake reply");
            return;
        }

        let Some(session) = self.sessions.get(&device).map(|s| s.clone()) else {
            return;
        };

        loop {
            let delivered = match run_exchange(
                conn.as_mut(),
                &session,
                wrapper.as_ref(),
                transform.as_ref(),
                MAX_BODY_LEN,
            )
            .await
            {
                Ok(d) => d,
                Err(e) => {
                    warn!(error = %e, device = %device, "exchange turn failed, closing session");
                    session.close();
                    self.sessions.remove(&device);
                    return;
                }
            };

            session.touch_last(now_millis());

            for p in delivered {
                if p.id == ids::SHUTDOWN {
                    session.close();
                    self.sessions.remove(&device);
                    self.proxies.remove(&device);
                    let _ = self.events_tx.send(ServerEvent::SessionClosed { device });
                    return;
                }
                if p.flags.proxy() {
                    let proxy = self.get_or_create_proxy(device, &session);
                    let reply = proxy.handle_sub_exchange(p).await;
                    session.queue(reply);
                    continue;
                }
                if !ids::is_builtin(p.id) {
                    if let Some(reply) = self.dispatch.dispatch(&p) {
                        session.queue(reply);
                    }
                }
            }

            if session.is_closed() {
                self.sessions.remove(&device);
                return;
            }
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
