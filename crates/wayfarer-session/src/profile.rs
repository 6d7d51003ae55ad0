//! Profile: host list, wrapper/transform selection, pacing.
//!
//! Immutable after construction; the only mutable state is the round-robin
//! cursor, held here behind an atomic rather than a `Mutex`, since it's
//! hot, single-field state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use wayfarer_core::config::{ProfileConfig, WorkHours};
use wayfarer_core::CoreError;
use wayfarer_transport::transform::transform_by_name;
use wayfarer_transport::wrapper::wrapper_by_name;
use wayfarer_transport::{Conn, Listener, Transform, Transport, Wrapper};

/// Selector policy for a Profile group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorPolicy {
    RoundRobin,
    Random,
    /// Random, but never repeats the immediately preceding index when more
    /// than one choice exists.
    SemiRandom,
    LastValid,
}

/// Pure selection function: given `len` sub-profiles and the previously
/// successful index, return the next index to try.
pub fn select_next(policy: SelectorPolicy, len: usize, previous: Option<usize>) -> usize {
    assert!(len > 0, "selector requires a non-empty profile group");
    match policy {
        SelectorPolicy::RoundRobin => previous.map(|p| (p + 1) % len).unwrap_or(0),
        SelectorPolicy::Random => rand::thread_rng().gen_range(0..len),
        SelectorPolicy::SemiRandom => {
            if len == 1 {
                0
            } else {
                let idx = rand::thread_rng().gen_range(0..len);
                if Some(idx) == previous {
                    (idx + 1) % len
                } else {
                    idx
                }
            }
        }
        SelectorPolicy::LastValid => previous.unwrap_or(0),
    }
}

/// Ordered host list plus wrapper/transform selection and pacing (spec
/// §4.2). `connect`/`listen` delegate to a `wayfarer_transport::Transport`
/// trait object chosen by the embedder.
pub struct Profile {
    hosts: Vec<String>,
    cursor: AtomicUsize,
    wrapper_name: String,
    wrapper_key: Option<String>,
    transform_name: String,
    transport: Arc<dyn Transport>,
    sleep_ms: u64,
    jitter_pct: u8,
    kill_date: Option<u64>,
    work_hours: Option<WorkHours>,
}

impl Profile {
    pub fn new(cfg: &ProfileConfig, transport: Arc<dyn Transport>) -> Result<Self, CoreError> {
        if cfg.hosts.is_empty() {
            return Err(CoreError::NoHost);
        }
        Ok(Profile {
            hosts: cfg.hosts.clone(),
            cursor: AtomicUsize::new(0),
            wrapper_name: cfg.wrapper.clone(),
            wrapper_key: cfg.wrapper_key.clone(),
            transform_name: cfg.transform.clone(),
            transport,
            sleep_ms: cfg.sleep_ms,
            jitter_pct: cfg.effective_jitter(),
            kill_date: cfg.kill_date,
            work_hours: cfg.work_hours,
        })
    }

    /// Round-robin over hosts; does not itself advance the cursor (spec
    /// §4.2 "on connect failure the caller advances").
    pub fn next(&self) -> Result<(String, Box<dyn Wrapper>, Box<dyn Transform>), CoreError> {
        let idx = self.cursor.load(Ordering::SeqCst) % self.hosts.len();
        let host = self.hosts[idx].clone();
        let wrapper = wrapper_by_name(&self.wrapper_name, self.wrapper_key.as_deref())?;
        let transform = transform_by_name(&self.transform_name)?;
        Ok((host, wrapper, transform))
    }

    pub fn advance(&self) {
        self.cursor.fetch_add(1, Ordering::SeqCst);
    }

    pub fn sleep_ms(&self) -> u64 {
        self.sleep_ms
    }

    pub fn jitter_pct(&self) -> u8 {
        self.jitter_pct
    }

    pub fn kill_date(&self) -> Option<u64> {
        self.kill_date
    }

    pub fn work_hours(&self) -> Option<WorkHours> {
        self.work_hours
    }

    /// `next_sleep = sleep * (1 + uniform(-jitter%, +jitter%))`.
    pub fn next_sleep(&self) -> Duration {
        let j = self.jitter_pct as f64 / 100.0;
        let factor = if j > 0.0 {
            1.0 + rand::thread_rng().gen_range(-j..=j)
        } else {
            1.0
        };
        let millis = (self.sleep_ms as f64 * factor).max(0.0) as u64;
        Duration::from_millis(millis)
    }

    pub async fn connect(&self, host: &str) -> Result<Box<dyn Conn>, CoreError> {
        self.transport.connect(host).await
    }

    pub async fn listen(&self, bind_addr: &str) -> Result<Box<dyn Listener>, CoreError> {
        self.transport.listen(bind_addr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_transport::tcp::TcpTransport;

    fn cfg(hosts: &[&str]) -> ProfileConfig {
        ProfileConfig {
            hosts: hosts.iter().map(|s| s.to_string()).collect(),
            ..ProfileConfig::default()
        }
    }

    #[test]
    fn rejects_empty_host_list() {
        let transport: Arc<dyn Transport> = Arc::new(TcpTransport);
        assert!(matches!(
            Profile::new(&cfg(&[]), transport),
            Err(CoreError::NoHost)
        ));
    }

    #[test]
    fn round_robin_over_hosts() {
        let transport: Arc<dyn Transport> = Arc::new(TcpTransport);
        let p = Profile::new(&cfg(&["a:1", "b:2", "c:3"]), transport).unwrap();
        let (h0, _, _) = p.next().unwrap();
        assert_eq!(h0, "a:1");
        p.advance();
        let (h1, _, _) = p.next().unwrap();
        assert_eq!(h1, "b:2");
        p.advance();
        p.advance();
        let (h3, _, _) = p.next().unwrap();
        assert_eq!(h3, "a:1");
    }

    #[test]
    fn next_sleep_bounded_by_jitter() {
        let mut c = cfg(&["a:1"]);
        c.sleep_ms = 1000;
        c.jitter = 10;
        let transport: Arc<dyn Transport> = Arc::new(TcpTransport);
        let p = Profile::new(&c, transport).unwrap();
        for _ in 0..50 {
            let d = p.next_sleep().as_millis();
            assert!((900..=1100).contains(&d), "jittered sleep {d} out of range");
        }
    }

    #[test]
    fn selector_round_robin_wraps() {
        assert_eq!(select_next(SelectorPolicy::RoundRobin, 3, None), 0);
        assert_eq!(select_next(SelectorPolicy::RoundRobin, 3, Some(0)), 1);
        assert_eq!(select_next(SelectorPolicy::RoundRobin, 3, Some(2)), 0);
    }

    #[test]
    fn selector_last_valid_repeats() {
        assert_eq!(select_next(SelectorPolicy::LastValid, 4, Some(2)), 2);
        assert_eq!(select_next(SelectorPolicy::LastValid, 4, None), 0);
    }

    #[test]
    fn selector_semi_random_avoids_immediate_repeat() {
        for _ in 0..50 {
            let idx = select_next(SelectorPolicy::SemiRandom, 3, Some(1));
            assert_ne!(idx, 1);
        }
    }
}
