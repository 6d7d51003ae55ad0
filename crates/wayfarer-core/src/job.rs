//! Job data types.
//!
//! `Job` itself carries no reference back to its owning Session — the job
//! table lives inside the Session that created it (`wayfarer-session::job`),
//! so there is nothing to break a cycle on; a `Job` only remembers its own
//! id and the originating device for operator-facing display.

use serde::{Deserialize, Serialize};

use crate::device::Device;

/// A job's position in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, packet queued.
    Waiting,
    /// Agent acknowledged reception.
    Accepted,
    /// Result bytes streaming in, possibly multi-fragment.
    Receiving,
    /// Terminal: completed successfully.
    Completed,
    /// Terminal: completed with an error.
    Error,
    /// Terminal: operator-requested cancel. The agent may still send the
    /// result, which is discarded.
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error | JobStatus::Canceled)
    }
}

/// A single unit of work tracked against one agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: u16,
    pub job_type: u8,
    pub device: Device,
    pub status: JobStatus,
    /// Unix millis.
    pub start: u64,
    /// Unix millis; set when the job reaches a terminal status.
    pub complete: Option<u64>,
    pub result: Option<Vec<u8>>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: u16, job_type: u8, device: Device, now_millis: u64) -> Self {
        Job {
            id,
            job_type,
            device,
            status: JobStatus::Waiting,
            start: now_millis,
            complete: None,
            result: None,
            error: None,
        }
    }

    pub fn mark_accepted(&mut self) {
        if self.status == JobStatus::Waiting {
            self.status = JobStatus::Accepted;
        }
    }

    pub fn mark_receiving(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Receiving;
        }
    }

    pub fn complete_ok(&mut self, result: Vec<u8>, now_millis: u64) {
        if self.status.is_terminal() {
            return;
        }
        self.result = Some(result);
        self.status = JobStatus::Completed;
        self.complete = Some(now_millis);
    }

    pub fn complete_err(&mut self, error: String, now_millis: u64) {
        if self.status.is_terminal() {
            return;
        }
        self.error = Some(error);
        self.status = JobStatus::Error;
        self.complete = Some(now_millis);
    }

    pub fn cancel(&mut self, now_millis: u64) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Canceled;
        self.complete = Some(now_millis);
    }
}
