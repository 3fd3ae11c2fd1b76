use serde::{Deserialize, Serialize};

use crate::fixed::Ticks;
use crate::id::{AgvId, NodeId};

/// Where a job is in its lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting for its arrival time or for a free vehicle.
    Pending,
    /// Bound to a vehicle that is driving to the origin.
    Assigned(AgvId),
    /// The vehicle has reached the origin and is heading for the destination.
    PickedUp(AgvId),
    Completed,
}

/// A transport request: carry something from `origin` to `destination`,
/// available from tick `arrival` onwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub arrival: Ticks,
    pub origin: NodeId,
    pub destination: NodeId,
    status: JobStatus,
    picked_up_at: Option<Ticks>,
    completion_time: Option<Ticks>,
}

impl Job {
    pub fn new(arrival: Ticks, origin: NodeId, destination: NodeId) -> Self {
        Self {
            arrival,
            origin,
            destination,
            status: JobStatus::Pending,
            picked_up_at: None,
            completion_time: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Tick at which the job was delivered, or `None` if it never was.
    pub fn completion_time(&self) -> Option<Ticks> {
        self.completion_time
    }

    pub fn picked_up_at(&self) -> Option<Ticks> {
        self.picked_up_at
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }

    /// Whether a dispatcher may hand this job to an idle vehicle at `tick`.
    pub fn is_eligible(&self, tick: Ticks) -> bool {
        self.status == JobStatus::Pending && self.arrival <= tick
    }

    /// Ticks between arrival and completion. `None` until completed, or if
    /// the recorded completion precedes the arrival.
    pub fn latency(&self) -> Option<Ticks> {
        self.completion_time
            .and_then(|done| done.checked_sub(self.arrival))
    }

    /// The vehicle currently responsible for this job.
    pub fn carrier(&self) -> Option<AgvId> {
        match self.status {
            JobStatus::Assigned(agv) | JobStatus::PickedUp(agv) => Some(agv),
            JobStatus::Pending | JobStatus::Completed => None,
        }
    }

    pub(crate) fn assign(&mut self, agv: AgvId) {
        debug_assert_eq!(self.status, JobStatus::Pending);
        self.status = JobStatus::Assigned(agv);
    }

    pub(crate) fn pick_up(&mut self, tick: Ticks) {
        if let JobStatus::Assigned(agv) = self.status {
            self.status = JobStatus::PickedUp(agv);
            self.picked_up_at = Some(tick);
        }
    }

    /// Record delivery. A job is completed at most once.
    pub(crate) fn complete(&mut self, tick: Ticks) {
        if self.status == JobStatus::Completed {
            return;
        }
        self.status = JobStatus::Completed;
        self.completion_time = Some(tick);
    }
}
