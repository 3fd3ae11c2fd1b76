//! The simulation stepper: dispatches jobs to idle vehicles and advances
//! the fleet one tick at a time.
//!
//! # Three-Phase Tick
//!
//! 1. **Assignment** -- eligible jobs, oldest arrival first (ties by list
//!    order), go to idle vehicles in fleet order.
//! 2. **Movement** -- every vehicle runs its step protocol, in fleet order.
//! 3. **Bookkeeping** -- deliver the tick's events and append a
//!    [`TickCounters`] row. Skipped entirely when statistics are off.
//!
//! A run always lasts exactly `iteration_cnt` ticks. Jobs that are not
//! delivered by then keep `completion_time() == None`.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::agv::{Agv, StepContext, StepOutcome};
use crate::backoff::BackoffPolicy;
use crate::event::{Event, EventKind, EventLog, PassiveListener};
use crate::fixed::{Fixed64, Ticks};
use crate::id::{AgvId, JobId, NodeId};
use crate::job::{Job, JobStatus};
use crate::map::FactoryMap;
use crate::rng::SimRng;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Run parameters. Deserializable so scenario files can omit any field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of ticks to run.
    pub iteration_cnt: Ticks,
    /// Skip the bookkeeping phase (no events, no counters).
    pub skip_statistics: bool,
    pub backoff: BackoffPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            iteration_cnt: 100,
            skip_statistics: false,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl SimConfig {
    pub fn new(iteration_cnt: Ticks) -> Self {
        Self {
            iteration_cnt,
            ..Self::default()
        }
    }

    pub fn skip_statistics(mut self) -> Self {
        self.skip_statistics = true;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Everything a run needs: the shared floor, the job list, the fleet (all
/// placed on `map`), and the run parameters.
pub struct SimulationOptions<'a> {
    pub map: &'a mut FactoryMap,
    pub jobs: &'a mut [Job],
    pub agvs: &'a mut [Agv],
    pub config: SimConfig,
}

/// Errors detected before the first tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("{agv} does not hold {node} on this map")]
    ForeignAgv { agv: AgvId, node: NodeId },
    #[error("{agv} still carries {job} from an earlier run")]
    AgvBusy { agv: AgvId, job: JobId },
    #[error("{job} references invalid node {node}")]
    InvalidJobNode { job: JobId, node: NodeId },
    #[error("{job} is no longer pending")]
    JobNotPending { job: JobId },
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Per-tick counters recorded during bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickCounters {
    pub tick: Ticks,
    /// Nodes held at the end of the tick.
    pub occupied: usize,
    pub moves: u32,
    pub yields: u32,
    /// Vehicles that failed to take their next node.
    pub blocked: u32,
    pub completions: u32,
    /// Jobs not yet assigned at the end of the tick, arrived or not.
    pub pending_jobs: usize,
    pub stalled: u32,
}

/// What a run produced besides the mutated jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub ticks_run: Ticks,
    /// Jobs delivered during this run.
    pub completed: usize,
    /// One row per tick; empty when statistics were skipped.
    pub counters: Vec<TickCounters>,
    /// Delivered events in emission order; empty when statistics were skipped.
    pub events: Vec<Event>,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// A run in progress. Use [`simulation`] to run one to completion, or drive
/// it tick by tick with [`Simulation::step`].
pub struct Simulation<'a> {
    map: &'a mut FactoryMap,
    jobs: &'a mut [Job],
    agvs: &'a mut [Agv],
    config: SimConfig,
    /// Pending job ids, by arrival then list position.
    queue: VecDeque<JobId>,
    events: EventLog,
    rng: SimRng,
    yield_probability: Fixed64,
    tick: Ticks,
    completed: usize,
    counters: Vec<TickCounters>,
}

impl std::fmt::Debug for Simulation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("config", &self.config)
            .field("queued", &self.queue.len())
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

impl<'a> Simulation<'a> {
    /// Check the inputs and prepare tick 0.
    ///
    /// Jobs must all be pending and vehicles must carry nothing. State left
    /// over from an earlier run is rejected rather than resumed.
    pub fn new(options: SimulationOptions<'a>) -> Result<Self, SimError> {
        let SimulationOptions {
            map,
            jobs,
            agvs,
            config,
        } = options;

        let mut seen = BTreeSet::new();
        for agv in agvs.iter() {
            let node = agv.current_node();
            if map.holder(node) != Some(agv.id()) || !seen.insert(agv.id()) {
                return Err(SimError::ForeignAgv {
                    agv: agv.id(),
                    node,
                });
            }
            if let Some(job) = agv.job() {
                return Err(SimError::AgvBusy { agv: agv.id(), job });
            }
        }
        for (i, job) in jobs.iter().enumerate() {
            let id = JobId(i as u32);
            for node in [job.origin, job.destination] {
                if !map.contains(node) {
                    return Err(SimError::InvalidJobNode { job: id, node });
                }
            }
            if job.status() != JobStatus::Pending {
                return Err(SimError::JobNotPending { job: id });
            }
        }

        let mut queue: Vec<JobId> = (0..jobs.len() as u32).map(JobId).collect();
        queue.sort_by_key(|id| jobs[id.index()].arrival);

        let events = if config.skip_statistics {
            EventLog::disabled()
        } else {
            EventLog::new()
        };

        Ok(Self {
            rng: SimRng::new(config.backoff.seed),
            yield_probability: config.backoff.yield_probability(),
            map,
            jobs,
            agvs,
            config,
            queue: queue.into(),
            events,
            tick: 0,
            completed: 0,
            counters: Vec::new(),
        })
    }

    /// The tick the next [`step`](Self::step) will run.
    pub fn tick(&self) -> Ticks {
        self.tick
    }

    pub fn is_finished(&self) -> bool {
        self.tick >= self.config.iteration_cnt
    }

    pub fn map(&self) -> &FactoryMap {
        &*self.map
    }

    pub fn jobs(&self) -> &[Job] {
        &*self.jobs
    }

    pub fn agvs(&self) -> &[Agv] {
        &*self.agvs
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Register a listener for events delivered during bookkeeping.
    pub fn on_event(&mut self, listener: PassiveListener) {
        self.events.on_passive(listener);
    }

    /// Stop recording events of `kind`. Counters are unaffected.
    pub fn suppress(&mut self, kind: EventKind) {
        self.events.suppress(kind);
    }

    /// Run one tick. Does nothing once the iteration budget is spent.
    pub fn step(&mut self) {
        if self.is_finished() {
            return;
        }
        self.phase_assign();
        let counters = self.phase_move();
        if !self.config.skip_statistics {
            self.phase_bookkeeping(counters);
        }
        self.tick += 1;
    }

    /// Run the remaining ticks and hand back the report.
    pub fn run(mut self) -> SimulationReport {
        info!(
            ticks = self.config.iteration_cnt,
            jobs = self.jobs.len(),
            agvs = self.agvs.len(),
            "simulation started"
        );
        while !self.is_finished() {
            self.step();
        }
        info!(
            ticks = self.tick,
            completed = self.completed,
            total = self.jobs.len(),
            "simulation finished"
        );
        self.into_report()
    }

    pub fn into_report(self) -> SimulationReport {
        SimulationReport {
            ticks_run: self.tick,
            completed: self.completed,
            counters: self.counters,
            events: self.events.into_history(),
        }
    }

    // -----------------------------------------------------------------------
    // Phase 1: Assignment
    // -----------------------------------------------------------------------

    fn phase_assign(&mut self) {
        let tick = self.tick;
        let mut idle = self.agvs.iter_mut().filter(|agv| agv.is_idle());

        while let Some(&job_id) = self.queue.front() {
            if !self.jobs[job_id.index()].is_eligible(tick) {
                break;
            }
            let Some(agv) = idle.next() else {
                break;
            };
            self.queue.pop_front();
            agv.assign(job_id, &mut self.jobs[job_id.index()]);
            debug!(job = %job_id, agv = %agv.id(), tick, "job assigned");
            self.events.emit(Event::JobAssigned {
                job: job_id,
                agv: agv.id(),
                tick,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Phase 2: Movement
    // -----------------------------------------------------------------------

    fn phase_move(&mut self) -> TickCounters {
        let mut counters = TickCounters {
            tick: self.tick,
            ..TickCounters::default()
        };
        let mut ctx = StepContext {
            map: &mut *self.map,
            jobs: &mut *self.jobs,
            events: &mut self.events,
            rng: &mut self.rng,
            backoff: &self.config.backoff,
            yield_probability: self.yield_probability,
            tick: self.tick,
        };

        for agv in self.agvs.iter_mut() {
            let report = agv.step(&mut ctx);
            match report.outcome {
                StepOutcome::Moved { .. } => counters.moves += 1,
                StepOutcome::Yielded { .. } => counters.yields += 1,
                StepOutcome::Blocked { .. } => counters.blocked += 1,
                StepOutcome::Stalled => counters.stalled += 1,
                StepOutcome::Idle | StepOutcome::Waiting => {}
            }
            if report.delivered.is_some() {
                counters.completions += 1;
            }
        }

        self.completed += counters.completions as usize;
        counters
    }

    // -----------------------------------------------------------------------
    // Phase 3: Bookkeeping
    // -----------------------------------------------------------------------

    fn phase_bookkeeping(&mut self, mut counters: TickCounters) {
        debug_assert!(
            self.agvs
                .iter()
                .all(|agv| self.map.holder(agv.current_node()) == Some(agv.id())),
            "vehicle position and lock table disagree"
        );
        counters.occupied = self.map.occupied_count();
        counters.pending_jobs = self.queue.len();
        self.events.deliver();
        self.counters.push(counters);
    }
}

/// Run a whole simulation and return its report.
///
/// The observable results are the jobs' completion times and, unless
/// statistics are skipped, the counters and events in the report.
pub fn simulation(options: SimulationOptions<'_>) -> Result<SimulationReport, SimError> {
    Ok(Simulation::new(options)?.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{NoPlanning, ShortestPath};

    fn line(n: u32) -> FactoryMap {
        let mut map = FactoryMap::new(n as usize);
        for i in 0..n - 1 {
            map.two_way_link(NodeId(i), &[NodeId(i + 1)]).unwrap();
        }
        map
    }

    #[test]
    fn runs_exactly_iteration_cnt_ticks() {
        let mut map = line(3);
        let mut agvs = vec![Agv::new(&mut map, NodeId(0), ShortestPath).unwrap()];
        let mut jobs = vec![];
        let report = simulation(SimulationOptions {
            map: &mut map,
            jobs: &mut jobs,
            agvs: &mut agvs,
            config: SimConfig::new(7),
        })
        .unwrap();
        assert_eq!(report.ticks_run, 7);
        assert_eq!(report.counters.len(), 7);
        assert_eq!(report.counters[6].tick, 6);
    }

    #[test]
    fn two_jobs_on_a_line() {
        let mut map = line(3);
        let (a, m, b) = (NodeId(0), NodeId(1), NodeId(2));
        let mut agvs = vec![Agv::new(&mut map, m, ShortestPath).unwrap()];
        let mut jobs = vec![Job::new(1, b, a), Job::new(2, b, a)];
        let report = simulation(SimulationOptions {
            map: &mut map,
            jobs: &mut jobs,
            agvs: &mut agvs,
            config: SimConfig::new(18).skip_statistics(),
        })
        .unwrap();
        assert_eq!(jobs[0].completion_time(), Some(3));
        assert_eq!(jobs[1].completion_time(), Some(7));
        assert_eq!(report.completed, 2);
        assert!(report.counters.is_empty());
        assert!(report.events.is_empty());
    }

    #[test]
    fn dispatch_is_fifo_by_arrival_then_list_order() {
        let mut map = line(4);
        let mut agvs = vec![Agv::new(&mut map, NodeId(0), NoPlanning).unwrap()];
        let mut jobs = vec![
            Job::new(5, NodeId(1), NodeId(2)),
            Job::new(2, NodeId(2), NodeId(3)),
            Job::new(2, NodeId(3), NodeId(1)),
        ];
        let mut sim = Simulation::new(SimulationOptions {
            map: &mut map,
            jobs: &mut jobs,
            agvs: &mut agvs,
            config: SimConfig::new(10),
        })
        .unwrap();
        for _ in 0..3 {
            sim.step();
        }
        assert_eq!(sim.agvs()[0].job(), Some(JobId(1)));
        assert_eq!(sim.jobs()[2].status(), JobStatus::Pending);
    }

    #[test]
    fn jobs_wait_for_their_arrival_tick() {
        let mut map = line(2);
        let mut agvs = vec![Agv::new(&mut map, NodeId(0), ShortestPath).unwrap()];
        let mut jobs = vec![Job::new(4, NodeId(0), NodeId(1))];
        let report = simulation(SimulationOptions {
            map: &mut map,
            jobs: &mut jobs,
            agvs: &mut agvs,
            config: SimConfig::new(10),
        })
        .unwrap();
        assert_eq!(jobs[0].completion_time(), Some(4));
        let assigned = report
            .events
            .iter()
            .find(|e| matches!(e, Event::JobAssigned { .. }))
            .unwrap();
        assert_eq!(assigned.tick(), 4);
    }

    #[test]
    fn unfinished_jobs_keep_no_completion_time() {
        let mut map = line(6);
        let mut agvs = vec![Agv::new(&mut map, NodeId(0), ShortestPath).unwrap()];
        let mut jobs = vec![Job::new(0, NodeId(5), NodeId(0))];
        let report = simulation(SimulationOptions {
            map: &mut map,
            jobs: &mut jobs,
            agvs: &mut agvs,
            config: SimConfig::new(3),
        })
        .unwrap();
        assert_eq!(report.completed, 0);
        assert_eq!(jobs[0].completion_time(), None);
        assert_eq!(agvs[0].current_node(), NodeId(3));
    }

    #[test]
    fn rejects_vehicle_from_another_map() {
        let mut home = line(3);
        let mut other = line(3);
        let mut agvs = vec![Agv::new(&mut home, NodeId(1), ShortestPath).unwrap()];
        let err = Simulation::new(SimulationOptions {
            map: &mut other,
            jobs: &mut [],
            agvs: &mut agvs,
            config: SimConfig::default(),
        })
        .unwrap_err();
        assert_eq!(
            err,
            SimError::ForeignAgv {
                agv: AgvId(0),
                node: NodeId(1)
            }
        );
    }

    #[test]
    fn rejects_job_with_unknown_node() {
        let mut map = line(3);
        let mut jobs = vec![Job::new(0, NodeId(0), NodeId(8))];
        let err = Simulation::new(SimulationOptions {
            map: &mut map,
            jobs: &mut jobs,
            agvs: &mut [],
            config: SimConfig::default(),
        })
        .unwrap_err();
        assert_eq!(
            err,
            SimError::InvalidJobNode {
                job: JobId(0),
                node: NodeId(8)
            }
        );
    }

    #[test]
    fn rejects_vehicle_still_carrying_a_job() {
        let mut map = line(6);
        let mut agvs = vec![Agv::new(&mut map, NodeId(0), ShortestPath).unwrap()];
        let mut jobs = vec![Job::new(0, NodeId(5), NodeId(0))];
        simulation(SimulationOptions {
            map: &mut map,
            jobs: &mut jobs,
            agvs: &mut agvs,
            config: SimConfig::new(2),
        })
        .unwrap();
        assert_eq!(agvs[0].job(), Some(JobId(0)));

        // The stale job id would index past an empty job list.
        let err = Simulation::new(SimulationOptions {
            map: &mut map,
            jobs: &mut [],
            agvs: &mut agvs,
            config: SimConfig::new(3),
        })
        .unwrap_err();
        assert_eq!(
            err,
            SimError::AgvBusy {
                agv: AgvId(0),
                job: JobId(0)
            }
        );
    }

    #[test]
    fn rerunning_the_same_inputs_is_rejected() {
        let mut map = line(6);
        let mut agvs = vec![Agv::new(&mut map, NodeId(0), ShortestPath).unwrap()];
        let mut jobs = vec![Job::new(8, NodeId(5), NodeId(0))];
        simulation(SimulationOptions {
            map: &mut map,
            jobs: &mut jobs,
            agvs: &mut agvs,
            config: SimConfig::new(12),
        })
        .unwrap();
        let rerun = simulation(SimulationOptions {
            map: &mut map,
            jobs: &mut jobs,
            agvs: &mut agvs,
            config: SimConfig::new(10),
        });
        assert!(matches!(rerun, Err(SimError::AgvBusy { .. })));
        assert_eq!(jobs[0].completion_time(), None);
        assert_eq!(jobs[0].latency(), None);
    }

    #[test]
    fn rejects_jobs_completed_in_an_earlier_run() {
        let mut map = line(3);
        let mut agvs = vec![Agv::new(&mut map, NodeId(1), ShortestPath).unwrap()];
        let mut jobs = vec![Job::new(1, NodeId(2), NodeId(0))];
        simulation(SimulationOptions {
            map: &mut map,
            jobs: &mut jobs,
            agvs: &mut agvs,
            config: SimConfig::new(6),
        })
        .unwrap();
        assert_eq!(jobs[0].completion_time(), Some(3));
        assert!(agvs[0].is_idle());

        let err = Simulation::new(SimulationOptions {
            map: &mut map,
            jobs: &mut jobs,
            agvs: &mut agvs,
            config: SimConfig::new(6),
        })
        .unwrap_err();
        assert_eq!(err, SimError::JobNotPending { job: JobId(0) });
        assert_eq!(jobs[0].completion_time(), Some(3));
        assert_eq!(jobs[0].latency(), Some(2));
    }

    #[test]
    fn suppressed_kinds_leave_counters_alone() {
        let mut map = line(2);
        let mut agvs = vec![Agv::new(&mut map, NodeId(0), ShortestPath).unwrap()];
        let mut jobs = vec![Job::new(4, NodeId(0), NodeId(1))];
        let mut sim = Simulation::new(SimulationOptions {
            map: &mut map,
            jobs: &mut jobs,
            agvs: &mut agvs,
            config: SimConfig::new(10),
        })
        .unwrap();
        sim.suppress(EventKind::AgvMoved);
        let report = sim.run();

        assert!(report.events.iter().all(|e| e.kind() != EventKind::AgvMoved));
        assert!(
            report
                .events
                .iter()
                .any(|e| e.kind() == EventKind::JobCompleted)
        );
        assert_eq!(report.counters.iter().map(|c| c.moves).sum::<u32>(), 1);
        assert_eq!(report.completed, 1);
    }

    #[test]
    fn stepping_past_the_budget_is_a_no_op() {
        let mut map = line(2);
        let mut sim = Simulation::new(SimulationOptions {
            map: &mut map,
            jobs: &mut [],
            agvs: &mut [],
            config: SimConfig::new(1),
        })
        .unwrap();
        sim.step();
        sim.step();
        assert_eq!(sim.tick(), 1);
        assert!(sim.is_finished());
    }
}
