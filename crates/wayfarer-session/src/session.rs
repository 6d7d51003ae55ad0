//! Session state machine.
//!
//! One `Session` per connected agent, shared (`Arc<Session>`) between its
//! two long-lived tasks: the poll/exchange task and the event dispatcher.
//! Fields the poll task treats as "owned" (`frags`, `jobs`, `peek`) are
//! still behind a `tokio::sync::Mutex` because the type system can't
//! otherwise express single-task ownership through an `Arc` — the lock is
//! uncontended in the common case.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{error, warn};
use wayfarer_core::cluster::Cluster;
use wayfarer_core::config::WorkHours;
use wayfarer_core::flags::Flags;
use wayfarer_core::{ids, CoreError, Device, Job, JobStatus, Packet};

use crate::job_table::JobTable;
use crate::profile::Profile;
use crate::state::{self, StateFlags};

/// Bounded FIFO capacity for `send`/`chn`.
pub const SEND_QUEUE_CAPACITY: usize = 256;

/// Server-owned map from device identity to live Session. The Server
/// exclusively owns this map.
pub type SessionTable = Arc<DashMap<Device, Arc<Session>>>;

pub fn new_session_table() -> SessionTable {
    Arc::new(DashMap::new())
}

pub struct Session {
    pub id: Device,
    pub profile: Arc<Profile>,
    addr: tokio::sync::Mutex<Option<String>>,
    state: StateFlags,
    last: AtomicU64,

    send_tx: mpsc::Sender<Packet>,
    send_rx: tokio::sync::Mutex<mpsc::Receiver<Packet>>,
    chn_tx: std::sync::Mutex<Option<mpsc::Sender<Packet>>>,
    chn_rx: tokio::sync::Mutex<Option<mpsc::Receiver<Packet>>>,
    wake_tx: mpsc::Sender<()>,
    wake_rx: tokio::sync::Mutex<mpsc::Receiver<()>>,
    peek: tokio::sync::Mutex<Option<Packet>>,

    frags: tokio::sync::Mutex<HashMap<u16, Cluster>>,
    jobs: tokio::sync::Mutex<JobTable>,

    /// Held for the duration of one exchange turn, enforcing at-most-one
    /// concurrent exchange per connection.
    pub(crate) transport_busy: tokio::sync::Mutex<()>,
}

impl Session {
    pub fn new(id: Device, profile: Arc<Profile>) -> Arc<Session> {
        let (send_tx, send_rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
        let (wake_tx, wake_rx) = mpsc::channel(1);
        Arc::new(Session {
            id,
            profile,
            addr: tokio::sync::Mutex::new(None),
            state: StateFlags::new(),
            last: AtomicU64::new(0),
            send_tx,
            send_rx: tokio::sync::Mutex::new(send_rx),
            chn_tx: std::sync::Mutex::new(None),
            chn_rx: tokio::sync::Mutex::new(None),
            wake_tx,
            wake_rx: tokio::sync::Mutex::new(wake_rx),
            peek: tokio::sync::Mutex::new(None),
            frags: tokio::sync::Mutex::new(HashMap::new()),
            jobs: tokio::sync::Mutex::new(JobTable::new()),
            transport_busy: tokio::sync::Mutex::new(()),
        })
    }

    pub fn state(&self) -> &StateFlags {
        &self.state
    }

    pub fn last(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }

    pub fn touch_last(&self, now_millis: u64) {
        self.last.store(now_millis, Ordering::SeqCst);
    }

    pub async fn addr(&self) -> Option<String> {
        self.addr.lock().await.clone()
    }

    pub async fn set_addr(&self, addr: String) {
        *self.addr.lock().await = Some(addr);
    }

    pub fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    /// Sleep for `dur`, returning early if [`Session::wake`] fires in the
    /// meantime. Lets the agent's poll loop skip the rest of a pacing sleep
    /// when the operator queues work rather than waiting out the full
    /// interval.
    pub async fn sleep_or_wake(&self, dur: std::time::Duration) {
        let mut wake_rx = self.wake_rx.lock().await;
        tokio::select! {
            _ = tokio::time::sleep(dur) => {}
            _ = wake_rx.recv() => {}
        }
    }

    pub fn work_hours(&self) -> Option<WorkHours> {
        self.profile.work_hours()
    }

    /// Gate: true unless `work_hours` is set and the current local time
    /// falls outside the allowed window. `sunday_based_weekday` and the
    /// minute components are supplied by the caller (process-local clock),
    /// kept out of this pure check so it stays unit-testable.
    pub fn within_work_hours(&self, sunday_based_weekday: u8, hour: u8, minute: u8) -> bool {
        match self.work_hours() {
            None => true,
            Some(wh) => {
                if !wh.allows_weekday(sunday_based_weekday) {
                    return false;
                }
                let now = (hour as u32) * 60 + minute as u32;
                let start = (wh.start_hour as u32) * 60 + wh.start_min as u32;
                let end = (wh.end_hour as u32) * 60 + wh.end_min as u32;
                now >= start && now <= end
            }
        }
    }

    pub fn kill_date_passed(&self, now_unix_secs: u64) -> bool {
        matches!(self.profile.kill_date(), Some(kd) if now_unix_secs >= kd)
    }

    // -- Channel mode (`chn` is populated iff `state.CHANNEL_PROXY` is set) --

    pub async fn open_channel(&self) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
        *self.chn_tx.lock().unwrap() = Some(tx);
        *self.chn_rx.lock().await = Some(rx);
        self.state.set(state::CHANNEL);
        self.state.set(state::CHANNEL_PROXY);
    }

    pub async fn close_channel(&self) {
        *self.chn_tx.lock().unwrap() = None;
        *self.chn_rx.lock().await = None;
        self.state.unset(state::CHANNEL);
        self.state.unset(state::CHANNEL_PROXY);
    }

    // -- Send queue discipline --

    /// Drop if `SEND_CLOSE`; non-blocking send to `chn` if channel-proxy is
    /// active, else non-blocking send to `send`. Silent drop on a full
    /// queue — loss-then-retry is the job layer's job.
    pub fn queue(&self, pkt: Packet) {
        if self.state.send_closed() {
            return;
        }
        if self.state.channel_proxy() {
            let guard = self.chn_tx.lock().unwrap();
            if let Some(tx) = guard.as_ref() {
                let _ = tx.try_send(pkt);
                return;
            }
        }
        let _ = self.send_tx.try_send(pkt);
    }

    async fn try_recv_chn(&self) -> Option<Packet> {
        let mut rx = self.chn_rx.lock().await;
        rx.as_mut().and_then(|r| r.try_recv().ok())
    }

    /// Peek slot first, else drain from `send`/`chn` (blocking during
    /// channel mode when `allow_block` is set, non-blocking otherwise).
    /// Returns a bare keepalive ping when nothing is queued outside channel
    /// mode.
    pub async fn pick(&self, allow_block: bool) -> Option<Packet> {
        let picked = self.pick_inner(allow_block).await;
        if let Some(p) = &picked {
            if p.is_noop_ping() {
                self.state.set(state::READY);
            } else {
                self.state.unset(state::READY);
            }
        }
        picked
    }

    async fn pick_inner(&self, allow_block: bool) -> Option<Packet> {
        if let Some(p) = self.peek.lock().await.take() {
            return Some(p);
        }
        if self.state.channel() {
            if let Some(p) = self.try_recv_chn().await {
                return Some(p);
            }
        }
        if let Ok(p) = self.send_rx.lock().await.try_recv() {
            return Some(p);
        }
        if !allow_block {
            return None;
        }
        if !self.state.channel() {
            return Some(Packet::new(ids::PING, self.id));
        }
        let mut wake_rx = self.wake_rx.lock().await;
        let mut send_rx = self.send_rx.lock().await;
        tokio::select! {
            _ = wake_rx.recv() => None,
            maybe = send_rx.recv() => maybe,
        }
    }

    /// If the next queued packet fits the envelope budget on its own,
    /// return it; otherwise opportunistically pack as many already-queued
    /// packets as fit under `MULTI`, stashing the overflow back into the
    /// peek slot. Channel-mode pumping hands packets through one at a time
    /// rather than bundling, since the pump has no notion of an envelope
    /// budget boundary to stop at.
    pub async fn next(&self, max_body_len: usize) -> Option<Packet> {
        let first = self.pick(true).await?;
        if self.state.channel() {
            return Some(first);
        }
        if first.body.len() > max_body_len {
            return Some(first);
        }
        let mut batch = vec![first];
        let mut total = batch[0].body.len();
        loop {
            let maybe = {
                let mut rx = self.send_rx.lock().await;
                rx.try_recv().ok()
            };
            match maybe {
                Some(p) => {
                    if total + p.body.len() > max_body_len || batch.len() >= u16::MAX as usize {
                        *self.peek.lock().await = Some(p);
                        break;
                    }
                    total += p.body.len();
                    batch.push(p);
                }
                None => break,
            }
        }
        if batch.len() == 1 {
            return batch.pop();
        }
        match pack_multi(self.id, batch) {
            Ok(p) => Some(p),
            Err(e) => {
                error!(error = %e, "failed to pack multi envelope");
                None
            }
        }
    }

    // -- Inbound reassembly / demultiplexing --

    /// Flatten one inbound packet into zero or more delivered packets:
    /// peels `MULTI` bundles, reassembles `FRAG` groups, passes everything
    /// else straight through. FIFO order is preserved.
    pub async fn ingest(&self, pkt: Packet) -> Vec<Packet> {
        let mut queue: VecDeque<Packet> = VecDeque::new();
        queue.push_back(pkt);
        let mut out = Vec::new();
        while let Some(p) = queue.pop_front() {
            if p.flags.multi() {
                match peel_multi(&p.body) {
                    Ok(subs) => queue.extend(subs),
                    Err(e) => warn!(error = %e, "multi packet malformed, discarding"),
                }
            } else if p.flags.frag() && !p.flags.is_single_fragment() {
                if let Some(done) = self.receive_fragment(p).await {
                    out.push(done);
                }
            } else {
                out.push(p);
            }
        }
        out
    }

    async fn receive_fragment(&self, pkt: Packet) -> Option<Packet> {
        let group = pkt.flags.group();
        let len = pkt.flags.len_field();
        let position = pkt.flags.position();
        let mut frags = self.frags.lock().await;
        let entry = frags.entry(group).or_insert_with(|| Cluster::new(len));
        match entry.insert(position, len, pkt) {
            Ok(true) => {
                let cluster = frags.remove(&group).unwrap();
                match cluster.complete() {
                    Ok(p) => Some(p),
                    Err(e) => {
                        error!(error = %e, "cluster completed but failed to finalize");
                        None
                    }
                }
            }
            Ok(false) => None,
            Err(e) => {
                warn!(group, error = %e, "fragment len mismatch, discarding cluster");
                frags.remove(&group);
                None
            }
        }
    }

    // -- Job table --

    pub async fn new_job(&self, job_type: u8, now_millis: u64) -> u16 {
        self.jobs.lock().await.new_job(job_type, self.id, now_millis)
    }

    pub async fn job_status(&self, id: u16) -> Option<JobStatus> {
        self.jobs.lock().await.get(id).map(|j| j.status)
    }

    pub async fn mark_job_accepted(&self, id: u16) {
        if let Some(j) = self.jobs.lock().await.get_mut(id) {
            j.mark_accepted();
        }
    }

    pub async fn mark_job_receiving(&self, id: u16) {
        if let Some(j) = self.jobs.lock().await.get_mut(id) {
            j.mark_receiving();
        }
    }

    pub async fn complete_job_ok(&self, id: u16, result: Vec<u8>, now_millis: u64) {
        if let Some(j) = self.jobs.lock().await.get_mut(id) {
            j.complete_ok(result, now_millis);
        }
    }

    pub async fn complete_job_err(&self, id: u16, error: String, now_millis: u64) {
        if let Some(j) = self.jobs.lock().await.get_mut(id) {
            j.complete_err(error, now_millis);
        }
    }

    pub async fn cancel_job(&self, id: u16, now_millis: u64) {
        if let Some(j) = self.jobs.lock().await.get_mut(id) {
            j.cancel(now_millis);
        }
    }

    pub async fn reap_jobs(&self, now_millis: u64, retention_millis: u64) {
        self.jobs.lock().await.reap(now_millis, retention_millis);
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Snapshot of every tracked job, for operator-facing listing.
    pub async fn list_jobs(&self) -> Vec<Job> {
        self.jobs.lock().await.values().cloned().collect()
    }

    // -- Shutdown --

    /// Idempotent: closes `wake` then `send` in that order.
    pub fn close(&self) {
        if self.state.closed() {
            return;
        }
        self.state.set(state::CLOSING);
        self.state.set(state::WAKE_CLOSE);
        self.state.set(state::SEND_CLOSE);
        self.state.set(state::CLOSED);
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed()
    }
}

/// Bundle `packets` into one `MULTI` envelope. Each sub-packet is prefixed
/// with its own `u32` big-endian length so the reader can self-delimit
/// them — the envelope itself has no field for this, so this length-prefix
/// framing is this workspace's own choice (see DESIGN.md).
fn pack_multi(device: Device, packets: Vec<Packet>) -> Result<Packet, CoreError> {
    let mut body = Vec::new();
    let count = packets.len() as u16;
    for p in &packets {
        let encoded = p.encode_to_vec()?;
        body.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
        body.extend_from_slice(&encoded);
    }
    let mut flags = Flags::empty().with(Flags::MULTI);
    flags.set_len(count);
    Ok(Packet::new(ids::MULTI, device).with_flags(flags).with_body(body))
}

/// Inverse of [`pack_multi`]: peel length-prefixed sub-packets off a
/// `MULTI` body until exhausted.
pub fn peel_multi(body: &[u8]) -> Result<Vec<Packet>, CoreError> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < body.len() {
        if pos + 4 > body.len() {
            return Err(CoreError::Malformed("multi: truncated sub-packet length"));
        }
        let len = u32::from_be_bytes(body[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        if pos + len > body.len() {
            return Err(CoreError::Malformed("multi: truncated sub-packet body"));
        }
        out.push(Packet::decode(&body[pos..pos + len])?);
        pos += len;
    }
    Ok(out)
}
