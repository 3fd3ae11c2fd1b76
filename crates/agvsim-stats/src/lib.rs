//! Fleet statistics for the AGV simulation.
//!
//! Tracks completions, per-vehicle movement and blocking, occupancy and job
//! service times over configurable time windows. Listens to core events
//! (`JobAssigned`, `JobCompleted`, `AgvMoved`, `AgvYielded`, `AgvBlocked`,
//! `AgvStalled`) plus the per-tick [`TickCounters`] rows, and aggregates them
//! into rolling metrics using [`Fixed64`] arithmetic.
//!
//! # Usage
//!
//! ```ignore
//! let mut stats = FleetStats::new(StatsConfig::default());
//! // Feed events each tick:
//! stats.process_event(&event);
//! // Close the tick with its counters row:
//! stats.end_tick(&counters);
//! // Or ingest a finished run in one go:
//! let stats = FleetStats::from_report(&report, StatsConfig::default());
//! let rate = stats.throughput();
//! ```

use std::collections::HashMap;

use agvsim_core::event::Event;
use agvsim_core::fixed::{Fixed64, Ticks, ratio};
use agvsim_core::id::{AgvId, JobId};
use agvsim_core::job::Job;
use agvsim_core::sim::{SimulationReport, TickCounters};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the statistics module.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Window size in ticks for rolling averages.
    pub window_size: Ticks,
    /// Maximum number of historical snapshots to retain per metric.
    pub history_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_size: 60,
            history_capacity: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer of [`Fixed64`] snapshots.
///
/// When full, the oldest entry is overwritten. Iterates oldest-to-newest.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<Fixed64>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            data: vec![Fixed64::ZERO; capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, value: Fixed64) {
        let capacity = self.capacity();
        self.data[self.head] = value;
        self.head = (self.head + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The most recently pushed value, if any.
    pub fn latest(&self) -> Option<Fixed64> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.capacity() - 1) % self.capacity();
        Some(self.data[idx])
    }

    /// Values from oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Fixed64> + '_ {
        let start = (self.head + self.capacity() - self.len) % self.capacity();
        (0..self.len).map(move |offset| self.data[(start + offset) % self.capacity()])
    }

    pub fn to_vec(&self) -> Vec<Fixed64> {
        self.iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Rolling window counter
// ---------------------------------------------------------------------------

/// Count over the most recent N ticks.
///
/// [`add`](Self::add) accumulates into the in-progress tick; [`commit`](Self::commit)
/// closes it, evicting the oldest tick once the window is full.
#[derive(Debug, Clone)]
struct RollingWindow {
    tick_counts: Vec<u64>,
    write_pos: usize,
    committed_total: u64,
    committed_count: usize,
    current: u64,
}

impl RollingWindow {
    fn new(window_size: usize) -> Self {
        assert!(window_size > 0, "RollingWindow size must be > 0");
        Self {
            tick_counts: vec![0; window_size],
            write_pos: 0,
            committed_total: 0,
            committed_count: 0,
            current: 0,
        }
    }

    fn add(&mut self, count: u64) {
        self.current += count;
    }

    fn commit(&mut self) {
        let window_size = self.tick_counts.len();
        if self.committed_count == window_size {
            self.committed_total -= self.tick_counts[self.write_pos];
        } else {
            self.committed_count += 1;
        }
        self.tick_counts[self.write_pos] = self.current;
        self.committed_total += self.current;
        self.current = 0;
        self.write_pos = (self.write_pos + 1) % window_size;
    }

    /// Committed ticks plus the in-progress tick.
    fn total(&self) -> u64 {
        self.committed_total + self.current
    }

    /// Average count per tick across the ticks the window has seen.
    fn rate(&self) -> Fixed64 {
        let ticks = self.committed_count + usize::from(self.current > 0);
        ratio(self.total(), ticks as u64)
    }
}

// ---------------------------------------------------------------------------
// Per-vehicle statistics
// ---------------------------------------------------------------------------

/// What a vehicle did during one tick. Movement wins over blocking, so a
/// vehicle that is blocked and then yields counts as moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum TickActivity {
    #[default]
    Idle,
    Blocked,
    Moving,
}

/// Lifetime totals for one vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgvTotals {
    pub moves: u64,
    pub yields: u64,
    pub blocked_ticks: u64,
    pub deliveries: u64,
    pub stalls: u64,
}

#[derive(Debug, Clone)]
struct AgvStats {
    totals: AgvTotals,
    moving_ticks: RollingWindow,
    blocked_ticks: RollingWindow,
    activity: TickActivity,
}

impl AgvStats {
    fn new(window_size: usize) -> Self {
        Self {
            totals: AgvTotals::default(),
            moving_ticks: RollingWindow::new(window_size),
            blocked_ticks: RollingWindow::new(window_size),
            activity: TickActivity::default(),
        }
    }

    fn record(&mut self, activity: TickActivity) {
        self.activity = self.activity.max_by_priority(activity);
    }

    fn end_tick(&mut self) {
        match self.activity {
            TickActivity::Moving => self.moving_ticks.add(1),
            TickActivity::Blocked => self.blocked_ticks.add(1),
            TickActivity::Idle => {}
        }
        self.moving_ticks.commit();
        self.blocked_ticks.commit();
        self.activity = TickActivity::Idle;
    }
}

impl TickActivity {
    fn max_by_priority(self, other: Self) -> Self {
        use TickActivity::*;
        match (self, other) {
            (Moving, _) | (_, Moving) => Moving,
            (Blocked, _) | (_, Blocked) => Blocked,
            (Idle, Idle) => Idle,
        }
    }
}

// ---------------------------------------------------------------------------
// FleetStats
// ---------------------------------------------------------------------------

/// Main fleet statistics aggregator.
///
/// Accepts events via [`process_event`](FleetStats::process_event), closes
/// ticks via [`end_tick`](FleetStats::end_tick), and exposes fleet-wide and
/// per-vehicle metrics through getter methods.
#[derive(Debug)]
pub struct FleetStats {
    config: StatsConfig,
    agvs: HashMap<AgvId, AgvStats>,
    completions: RollingWindow,
    observed: RollingWindow,
    throughput_history: RingBuffer,
    occupancy_history: RingBuffer,
    assigned_at: HashMap<JobId, Ticks>,
    service_total: u64,
    service_count: u64,
    service_max: Option<Ticks>,
    total_completions: u64,
    peak_occupancy: usize,
    ticks_observed: u64,
    current_tick: Ticks,
}

impl FleetStats {
    pub fn new(config: StatsConfig) -> Self {
        let ws = config.window_size as usize;
        let hc = config.history_capacity;
        Self {
            config,
            agvs: HashMap::new(),
            completions: RollingWindow::new(ws),
            observed: RollingWindow::new(ws),
            throughput_history: RingBuffer::new(hc),
            occupancy_history: RingBuffer::new(hc),
            assigned_at: HashMap::new(),
            service_total: 0,
            service_count: 0,
            service_max: None,
            total_completions: 0,
            peak_occupancy: 0,
            ticks_observed: 0,
            current_tick: 0,
        }
    }

    /// Aggregate a finished run.
    pub fn from_report(report: &SimulationReport, config: StatsConfig) -> Self {
        let mut stats = Self::new(config);
        stats.ingest(report);
        stats
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Tick of the last [`end_tick`](Self::end_tick) call.
    pub fn current_tick(&self) -> Ticks {
        self.current_tick
    }

    pub fn ticks_observed(&self) -> u64 {
        self.ticks_observed
    }

    // -- Event processing ---------------------------------------------------

    /// Replay a report's events tick by tick, closing each tick with its
    /// counters row. A report recorded with statistics skipped has neither,
    /// and leaves the aggregator untouched.
    pub fn ingest(&mut self, report: &SimulationReport) {
        let mut events = report.events.iter().peekable();
        for row in &report.counters {
            while let Some(event) = events.next_if(|e| e.tick() <= row.tick) {
                self.process_event(event);
            }
            self.end_tick(row);
        }
        for event in events {
            self.process_event(event);
        }
    }

    /// Process a single event, updating internal counters.
    pub fn process_event(&mut self, event: &Event) {
        match *event {
            Event::JobAssigned { job, tick, .. } => {
                self.assigned_at.insert(job, tick);
            }

            Event::JobCompleted { job, agv, tick, .. } => {
                self.total_completions += 1;
                self.completions.add(1);
                self.agv_mut(agv).totals.deliveries += 1;
                if let Some(start) = self.assigned_at.remove(&job) {
                    let service = tick - start;
                    self.service_total += service;
                    self.service_count += 1;
                    self.service_max = self.service_max.max(Some(service));
                }
            }

            Event::AgvMoved { agv, .. } => {
                let stats = self.agv_mut(agv);
                stats.totals.moves += 1;
                stats.record(TickActivity::Moving);
            }

            Event::AgvYielded { agv, .. } => {
                let stats = self.agv_mut(agv);
                stats.totals.yields += 1;
                stats.record(TickActivity::Moving);
            }

            Event::AgvBlocked { agv, .. } => {
                let stats = self.agv_mut(agv);
                stats.totals.blocked_ticks += 1;
                stats.record(TickActivity::Blocked);
            }

            Event::AgvStalled { agv, .. } => {
                self.agv_mut(agv).totals.stalls += 1;
            }

            Event::JobPickedUp { .. } => {}
        }
    }

    /// Finalize a tick from its counters row and advance all rolling windows.
    pub fn end_tick(&mut self, counters: &TickCounters) {
        self.current_tick = counters.tick;
        self.ticks_observed += 1;
        self.peak_occupancy = self.peak_occupancy.max(counters.occupied);

        self.observed.add(1);
        self.throughput_history.push(self.completions.rate());
        self.occupancy_history
            .push(Fixed64::saturating_from_num(counters.occupied));

        for agv in self.agvs.values_mut() {
            agv.end_tick();
        }
        self.completions.commit();
        self.observed.commit();
    }

    // -- Fleet queries ------------------------------------------------------

    pub fn total_completions(&self) -> u64 {
        self.total_completions
    }

    /// Completed jobs per tick over the rolling window.
    pub fn throughput(&self) -> Fixed64 {
        self.completions.rate()
    }

    /// Mean ticks from assignment to completion, over every completed job
    /// whose assignment was seen.
    pub fn mean_service_time(&self) -> Option<Fixed64> {
        (self.service_count > 0).then(|| ratio(self.service_total, self.service_count))
    }

    pub fn max_service_time(&self) -> Option<Ticks> {
        self.service_max
    }

    pub fn peak_occupancy(&self) -> usize {
        self.peak_occupancy
    }

    /// Jobs assigned but not yet completed.
    pub fn open_jobs(&self) -> usize {
        self.assigned_at.len()
    }

    // -- Per-vehicle queries ------------------------------------------------

    /// Lifetime totals for a vehicle, or zeros if it never produced an event.
    pub fn agv_totals(&self, agv: AgvId) -> AgvTotals {
        self.agvs.get(&agv).map(|a| a.totals).unwrap_or_default()
    }

    /// Fraction of windowed ticks in which the vehicle moved (0.0 to 1.0).
    pub fn utilization(&self, agv: AgvId) -> Fixed64 {
        self.agvs
            .get(&agv)
            .map(|a| ratio(a.moving_ticks.total(), self.observed.total()))
            .unwrap_or(Fixed64::ZERO)
    }

    /// Fraction of windowed ticks in which the vehicle was blocked and did
    /// not move (0.0 to 1.0).
    pub fn blocked_ratio(&self, agv: AgvId) -> Fixed64 {
        self.agvs
            .get(&agv)
            .map(|a| ratio(a.blocked_ticks.total(), self.observed.total()))
            .unwrap_or(Fixed64::ZERO)
    }

    /// Vehicles that produced at least one event, in id order.
    pub fn tracked_agvs(&self) -> Vec<AgvId> {
        let mut ids: Vec<AgvId> = self.agvs.keys().copied().collect();
        ids.sort();
        ids
    }

    // -- Historical data ----------------------------------------------------

    /// Throughput snapshots, one per observed tick.
    pub fn throughput_history(&self) -> &RingBuffer {
        &self.throughput_history
    }

    /// Occupied-node snapshots, one per observed tick.
    pub fn occupancy_history(&self) -> &RingBuffer {
        &self.occupancy_history
    }

    fn agv_mut(&mut self, agv: AgvId) -> &mut AgvStats {
        let ws = self.config.window_size as usize;
        self.agvs.entry(agv).or_insert_with(|| AgvStats::new(ws))
    }
}

// ---------------------------------------------------------------------------
// Job latency
// ---------------------------------------------------------------------------

/// Arrival-to-completion latency over a set of jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySummary {
    pub completed: usize,
    pub mean: Fixed64,
    pub max: Ticks,
}

/// Summarize the latency of the completed jobs, or `None` if none completed.
pub fn job_latency(jobs: &[Job]) -> Option<LatencySummary> {
    let latencies: Vec<Ticks> = jobs.iter().filter_map(Job::latency).collect();
    let max = *latencies.iter().max()?;
    Some(LatencySummary {
        completed: latencies.len(),
        mean: ratio(latencies.iter().sum(), latencies.len() as u64),
        max,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
