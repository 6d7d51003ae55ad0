//! Per-session job tracker.
//!
//! Lives inside the owning `Session`, not shared — accessed only from the
//! Session's own poll task.

use std::collections::HashMap;

use rand::Rng;
use wayfarer_core::{Device, Job, JobStatus};

/// Default retention before a terminal job's entry may be reaped; the
/// concrete duration is supplied by the caller from `wayfarer_core::config`.
#[derive(Default)]
pub struct JobTable {
    jobs: HashMap<u16, Job>,
}

impl JobTable {
    pub fn new() -> Self {
        JobTable { jobs: HashMap::new() }
    }

    /// Allocate a random id not currently in the map, retrying on collision
    /// — the table is tiny relative to `u16` space, so collisions are rare.
    pub fn new_job(&mut self, job_type: u8, device: Device, now_millis: u64) -> u16 {
        loop {
            let candidate: u16 = rand::thread_rng().gen_range(1..=u16::MAX);
            if !self.jobs.contains_key(&candidate) {
                self.jobs
                    .insert(candidate, Job::new(candidate, job_type, device, now_millis));
                return candidate;
            }
        }
    }

    pub fn get(&self, id: u16) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn get_mut(&mut self, id: u16) -> Option<&mut Job> {
        self.jobs.get_mut(&id)
    }

    pub fn remove(&mut self, id: u16) -> Option<Job> {
        self.jobs.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Sweep terminal jobs older than `retention_millis`.
    pub fn reap(&mut self, now_millis: u64, retention_millis: u64) {
        self.jobs.retain(|_, j| match j.complete {
            Some(completed_at) if j.status.is_terminal() => {
                now_millis.saturating_sub(completed_at) < retention_millis
            }
            _ => true,
        });
    }

    /// No job created on this table is ever stuck: every entry is either
    /// live (not terminal) or eligible for reaping.
    pub fn terminal_count(&self) -> usize {
        self.jobs.values().filter(|j| j.status.is_terminal()).count()
    }
}
