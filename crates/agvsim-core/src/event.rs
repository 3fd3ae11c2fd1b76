//! Typed simulation events with buffered, per-tick delivery.
//!
//! Vehicles and the dispatcher emit events during the assignment and
//! movement phases. They are held in a per-tick buffer and delivered in
//! batch during bookkeeping, first to passive listeners and then into the
//! run history returned by the stepper.
//!
//! # Suppression
//!
//! Individual kinds can be suppressed with [`EventLog::suppress`] (exposed
//! on the stepper as `Simulation::suppress`), and the whole log can be
//! disabled. Suppressed events are dropped at the emit site
//! and never buffered.

use serde::{Deserialize, Serialize};

use crate::fixed::Ticks;
use crate::id::{AgvId, JobId, NodeId};
use crate::planner::PlanError;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Why a vehicle gave up on its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StallReason {
    NoPathFound,
    InvalidNode,
    MalformedRoute,
}

impl From<&PlanError> for StallReason {
    fn from(err: &PlanError) -> Self {
        match err {
            PlanError::NoPathFound { .. } => StallReason::NoPathFound,
            PlanError::InvalidNode(_) => StallReason::InvalidNode,
            PlanError::MalformedRoute { .. } => StallReason::MalformedRoute,
        }
    }
}

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    // -- Dispatch --
    JobAssigned {
        job: JobId,
        agv: AgvId,
        tick: Ticks,
    },
    JobPickedUp {
        job: JobId,
        agv: AgvId,
        node: NodeId,
        tick: Ticks,
    },
    JobCompleted {
        job: JobId,
        agv: AgvId,
        node: NodeId,
        tick: Ticks,
    },

    // -- Movement --
    AgvMoved {
        agv: AgvId,
        from: NodeId,
        to: NodeId,
        tick: Ticks,
    },
    AgvBlocked {
        agv: AgvId,
        at: NodeId,
        next: NodeId,
        holder: Option<AgvId>,
        tick: Ticks,
    },
    AgvYielded {
        agv: AgvId,
        from: NodeId,
        to: NodeId,
        tick: Ticks,
    },
    AgvStalled {
        agv: AgvId,
        job: JobId,
        reason: StallReason,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    JobAssigned,
    JobPickedUp,
    JobCompleted,
    AgvMoved,
    AgvBlocked,
    AgvYielded,
    AgvStalled,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 7;

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::JobAssigned { .. } => EventKind::JobAssigned,
            Event::JobPickedUp { .. } => EventKind::JobPickedUp,
            Event::JobCompleted { .. } => EventKind::JobCompleted,
            Event::AgvMoved { .. } => EventKind::AgvMoved,
            Event::AgvBlocked { .. } => EventKind::AgvBlocked,
            Event::AgvYielded { .. } => EventKind::AgvYielded,
            Event::AgvStalled { .. } => EventKind::AgvStalled,
        }
    }

    pub fn tick(&self) -> Ticks {
        match *self {
            Event::JobAssigned { tick, .. }
            | Event::JobPickedUp { tick, .. }
            | Event::JobCompleted { tick, .. }
            | Event::AgvMoved { tick, .. }
            | Event::AgvBlocked { tick, .. }
            | Event::AgvYielded { tick, .. }
            | Event::AgvStalled { tick, .. } => tick,
        }
    }

    /// The vehicle the event is about.
    pub fn agv(&self) -> AgvId {
        match *self {
            Event::JobAssigned { agv, .. }
            | Event::JobPickedUp { agv, .. }
            | Event::JobCompleted { agv, .. }
            | Event::AgvMoved { agv, .. }
            | Event::AgvBlocked { agv, .. }
            | Event::AgvYielded { agv, .. }
            | Event::AgvStalled { agv, .. } => agv,
        }
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Buffers events for the current tick and keeps the delivered history.
pub struct EventLog {
    enabled: bool,
    suppressed: [bool; EVENT_KIND_COUNT],
    pending: Vec<Event>,
    history: Vec<Event>,
    listeners: Vec<PassiveListener>,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("enabled", &self.enabled)
            .field("suppressed", &self.suppressed)
            .field("pending", &self.pending.len())
            .field("history", &self.history.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            enabled: true,
            suppressed: [false; EVENT_KIND_COUNT],
            pending: Vec::new(),
            history: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// A log that drops everything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Stop recording `kind`.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        !self.enabled || self.suppressed[kind.index()]
    }

    /// Register a listener that sees every delivered event.
    pub fn on_passive(&mut self, listener: PassiveListener) {
        self.listeners.push(listener);
    }

    /// Buffer an event for delivery at the end of the tick.
    pub fn emit(&mut self, event: Event) {
        if self.is_suppressed(event.kind()) {
            return;
        }
        self.pending.push(event);
    }

    /// Deliver buffered events to listeners and move them into history.
    pub fn deliver(&mut self) {
        for event in &self.pending {
            for listener in &mut self.listeners {
                listener(event);
            }
        }
        self.history.append(&mut self.pending);
    }

    pub fn history(&self) -> &[Event] {
        &self.history
    }

    pub fn into_history(self) -> Vec<Event> {
        self.history
    }
}
