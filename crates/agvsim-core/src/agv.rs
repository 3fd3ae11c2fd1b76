//! Automated guided vehicles and their per-tick movement protocol.
//!
//! A vehicle always holds exactly the node it stands on. To move it must
//! first take the next node on its route with [`FactoryMap::try_lock`], and
//! only then release the node it is leaving. A failed attempt leaves the
//! vehicle where it is until the next tick.
//!
//! # Lifecycle
//!
//! `Idle -> Assigned -> Moving -> Idle`. An assigned vehicle with an empty
//! route plans towards its current waypoint (the job origin, then the job
//! destination). A planning failure leaves it `Stalled` with the job.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::event::{Event, EventLog, StallReason};
use crate::fixed::{Fixed64, Ticks};
use crate::id::{AgvId, JobId, NodeId};
use crate::job::Job;
use crate::map::{FactoryMap, MapError};
use crate::planner::{PlanError, Planner, validate_route};
use crate::rng::SimRng;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Observable vehicle state, derived from job, route and stall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgvState {
    /// No job.
    Idle,
    /// Has a job but no route yet (fresh assignment, after pickup, or after a yield).
    Assigned,
    /// Following a route.
    Moving,
    /// Planning failed; the vehicle keeps its job and no longer moves.
    Stalled,
}

/// Which waypoint of the current job the vehicle is heading for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Pickup,
    Dropoff,
}

/// What a vehicle did during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Idle,
    /// Has a job but nothing to follow (empty route).
    Waiting,
    Moved { from: NodeId, to: NodeId },
    Blocked { next: NodeId },
    Yielded { from: NodeId, to: NodeId },
    Stalled,
}

/// Result of [`Agv::step`]: the movement outcome plus any job delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub outcome: StepOutcome,
    pub delivered: Option<JobId>,
}

impl StepReport {
    fn new(outcome: StepOutcome) -> Self {
        Self {
            outcome,
            delivered: None,
        }
    }
}

/// Everything a vehicle may touch during its step.
///
/// The map is shared by the fleet; jobs are reached through the vehicle's
/// own assignment only.
pub struct StepContext<'a> {
    pub map: &'a mut FactoryMap,
    pub jobs: &'a mut [Job],
    pub events: &'a mut EventLog,
    pub rng: &'a mut SimRng,
    /// Decides when a blocked vehicle may roll for a yield.
    pub backoff: &'a BackoffPolicy,
    pub yield_probability: Fixed64,
    pub tick: Ticks,
}

// ---------------------------------------------------------------------------
// Agv
// ---------------------------------------------------------------------------

/// A vehicle on the factory floor.
#[derive(Debug)]
pub struct Agv {
    id: AgvId,
    current: NodeId,
    job: Option<JobId>,
    leg: Leg,
    /// Remaining hops, excluding the current node.
    route: VecDeque<NodeId>,
    planner: Box<dyn Planner>,
    stalled: Option<PlanError>,
    blocked_ticks: u32,
    odometer: u64,
}

impl Agv {
    /// Place a new vehicle on `start`, which it holds from now on.
    ///
    /// Fails if `start` is not a node of `map` or another vehicle stands there.
    pub fn new(
        map: &mut FactoryMap,
        start: NodeId,
        planner: impl Planner + 'static,
    ) -> Result<Self, MapError> {
        Self::with_boxed_planner(map, start, Box::new(planner))
    }

    pub fn with_boxed_planner(
        map: &mut FactoryMap,
        start: NodeId,
        planner: Box<dyn Planner>,
    ) -> Result<Self, MapError> {
        let id = map.spawn_holder(start)?;
        debug!(agv = %id, node = %start, "vehicle placed");
        Ok(Self {
            id,
            current: start,
            job: None,
            leg: Leg::Pickup,
            route: VecDeque::new(),
            planner,
            stalled: None,
            blocked_ticks: 0,
            odometer: 0,
        })
    }

    pub fn id(&self) -> AgvId {
        self.id
    }

    pub fn current_node(&self) -> NodeId {
        self.current
    }

    pub fn job(&self) -> Option<JobId> {
        self.job
    }

    /// Remaining hops, excluding the node the vehicle stands on.
    pub fn route(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.route.iter().copied()
    }

    /// The planning failure that stalled this vehicle, if any.
    pub fn stall_error(&self) -> Option<&PlanError> {
        self.stalled.as_ref()
    }

    /// Consecutive ticks the vehicle has failed to take its next node.
    pub fn blocked_ticks(&self) -> u32 {
        self.blocked_ticks
    }

    /// Hops taken since the vehicle was placed, yields included.
    pub fn odometer(&self) -> u64 {
        self.odometer
    }

    pub fn state(&self) -> AgvState {
        if self.stalled.is_some() {
            AgvState::Stalled
        } else if self.job.is_none() {
            AgvState::Idle
        } else if self.route.is_empty() {
            AgvState::Assigned
        } else {
            AgvState::Moving
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == AgvState::Idle
    }

    /// Bind `job` to this vehicle. The route is planned on the next step.
    pub(crate) fn assign(&mut self, job_id: JobId, job: &mut Job) {
        debug_assert!(self.is_idle(), "assigning to a busy vehicle");
        job.assign(self.id);
        self.job = Some(job_id);
        self.leg = Leg::Pickup;
        self.route.clear();
        self.blocked_ticks = 0;
    }

    // -----------------------------------------------------------------------
    // Per-tick protocol
    // -----------------------------------------------------------------------

    /// Advance this vehicle by at most one hop.
    pub fn step(&mut self, ctx: &mut StepContext<'_>) -> StepReport {
        let Some(job_id) = self.job else {
            return StepReport::new(StepOutcome::Idle);
        };
        if self.stalled.is_some() {
            return StepReport::new(StepOutcome::Stalled);
        }

        if self.route.is_empty() {
            if self.arrive(ctx, job_id) {
                return StepReport {
                    outcome: StepOutcome::Waiting,
                    delivered: Some(job_id),
                };
            }
            if let Err(err) = self.replan(ctx.map, &ctx.jobs[job_id.index()]) {
                warn!(agv = %self.id, job = %job_id, %err, "planning failed, vehicle stalled");
                ctx.events.emit(Event::AgvStalled {
                    agv: self.id,
                    job: job_id,
                    reason: StallReason::from(&err),
                    tick: ctx.tick,
                });
                self.stalled = Some(err);
                return StepReport::new(StepOutcome::Stalled);
            }
            if self.route.is_empty() {
                return StepReport::new(StepOutcome::Waiting);
            }
        }

        let Some(&next) = self.route.front() else {
            return StepReport::new(StepOutcome::Waiting);
        };

        if ctx.map.try_lock(next, self.id) {
            let from = self.current;
            self.route.pop_front();
            self.hop(ctx.map, next);
            ctx.events.emit(Event::AgvMoved {
                agv: self.id,
                from,
                to: next,
                tick: ctx.tick,
            });
            let delivered = self.arrive(ctx, job_id).then_some(job_id);
            return StepReport {
                outcome: StepOutcome::Moved { from, to: next },
                delivered,
            };
        }

        self.blocked_ticks += 1;
        ctx.events.emit(Event::AgvBlocked {
            agv: self.id,
            at: self.current,
            next,
            holder: ctx.map.holder(next),
            tick: ctx.tick,
        });

        if ctx.backoff.is_exhausted(self.blocked_ticks) && ctx.rng.chance(ctx.yield_probability) {
            if let Some(report) = self.sidestep(ctx, next, job_id) {
                return report;
            }
        }
        StepReport::new(StepOutcome::Blocked { next })
    }

    /// Take `next` (already locked) and release the node being left.
    fn hop(&mut self, map: &mut FactoryMap, next: NodeId) {
        map.unlock(self.current, self.id);
        self.current = next;
        self.odometer += 1;
        self.blocked_ticks = 0;
    }

    /// Plan from the current node to the active waypoint.
    fn replan(&mut self, map: &FactoryMap, job: &Job) -> Result<(), PlanError> {
        let target = match self.leg {
            Leg::Pickup => job.origin,
            Leg::Dropoff => job.destination,
        };
        let route = self.planner.plan(map, self.current, target)?;
        validate_route(map, &route, self.current, target)?;
        self.route = route.into_iter().skip(1).collect();
        Ok(())
    }

    /// Handle reaching a waypoint. Returns `true` when the job was delivered.
    fn arrive(&mut self, ctx: &mut StepContext<'_>, job_id: JobId) -> bool {
        let job = &mut ctx.jobs[job_id.index()];

        if self.leg == Leg::Pickup && self.current == job.origin {
            job.pick_up(ctx.tick);
            self.leg = Leg::Dropoff;
            self.route.clear();
            debug!(agv = %self.id, job = %job_id, node = %self.current, tick = ctx.tick, "job picked up");
            ctx.events.emit(Event::JobPickedUp {
                job: job_id,
                agv: self.id,
                node: self.current,
                tick: ctx.tick,
            });
        }

        if self.leg == Leg::Dropoff && self.current == job.destination {
            job.complete(ctx.tick);
            self.job = None;
            self.route.clear();
            info!(agv = %self.id, job = %job_id, node = %self.current, tick = ctx.tick, "job completed");
            ctx.events.emit(Event::JobCompleted {
                job: job_id,
                agv: self.id,
                node: self.current,
                tick: ctx.tick,
            });
            return true;
        }
        false
    }

    /// Step aside onto a free neighbour other than `contested`.
    ///
    /// The route is dropped and re-planned from the new position next tick.
    fn sidestep(
        &mut self,
        ctx: &mut StepContext<'_>,
        contested: NodeId,
        job_id: JobId,
    ) -> Option<StepReport> {
        let candidates: Vec<NodeId> = ctx
            .map
            .neighbours(self.current)
            .ok()?
            .iter()
            .copied()
            .filter(|&n| n != contested && ctx.map.is_free(n))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let to = candidates[ctx.rng.index(candidates.len())];
        if !ctx.map.try_lock(to, self.id) {
            return None;
        }

        let from = self.current;
        self.hop(ctx.map, to);
        self.route.clear();
        debug!(agv = %self.id, %from, %to, %contested, tick = ctx.tick, "vehicle yielded");
        ctx.events.emit(Event::AgvYielded {
            agv: self.id,
            from,
            to,
            tick: ctx.tick,
        });
        let delivered = self.arrive(ctx, job_id).then_some(job_id);
        Some(StepReport {
            outcome: StepOutcome::Yielded { from, to },
            delivered,
        })
    }
}
