//! AGV Sim Core -- a deterministic fleet simulation for automated guided
//! vehicles sharing a graph-shaped factory floor.
//!
//! Vehicles carry jobs between nodes. A node can be occupied by one vehicle
//! at a time, enforced by the map's non-blocking lock table. Each vehicle
//! plans its own route through a pluggable [`planner::Planner`], and the
//! stepper in [`sim`] ties dispatch, movement and bookkeeping together.
//!
//! # Tick Pipeline
//!
//! Each call to [`sim::Simulation::step`] runs:
//!
//! 1. **Assignment** -- hand eligible jobs to idle vehicles, FIFO by arrival.
//! 2. **Movement** -- each vehicle tries to take the next node on its route.
//! 3. **Bookkeeping** -- deliver events and record per-tick counters.
//!
//! # Example
//!
//! ```rust
//! use agvsim_core::agv::Agv;
//! use agvsim_core::job::Job;
//! use agvsim_core::map::FactoryMap;
//! use agvsim_core::planner::ShortestPath;
//! use agvsim_core::sim::{simulation, SimConfig, SimulationOptions};
//!
//! let mut map = FactoryMap::new(3);
//! let [a, m, b] = [map.list_nodes()[0], map.list_nodes()[1], map.list_nodes()[2]];
//! map.two_way_link(a, &[m]).unwrap();
//! map.two_way_link(m, &[b]).unwrap();
//!
//! let mut agvs = vec![Agv::new(&mut map, m, ShortestPath).unwrap()];
//! let mut jobs = vec![Job::new(1, b, a)];
//! simulation(SimulationOptions {
//!     map: &mut map,
//!     jobs: &mut jobs,
//!     agvs: &mut agvs,
//!     config: SimConfig::new(10),
//! })
//! .unwrap();
//! assert_eq!(jobs[0].completion_time(), Some(3));
//! ```
//!
//! # Key Types
//!
//! - [`map::FactoryMap`] -- nodes, undirected links, and node locks.
//! - [`planner::Planner`] -- route strategy; [`planner::ShortestPath`] is BFS.
//! - [`job::Job`] -- a transport request and its completion bookkeeping.
//! - [`agv::Agv`] -- a vehicle and its per-tick movement protocol.
//! - [`backoff::BackoffPolicy`] -- seeded yield rule that breaks head-on deadlocks.
//! - [`event::EventLog`] -- per-tick event buffer with passive listeners.

pub mod agv;
pub mod backoff;
pub mod event;
pub mod fixed;
pub mod id;
pub mod job;
pub mod map;
pub mod planner;
pub mod rng;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
