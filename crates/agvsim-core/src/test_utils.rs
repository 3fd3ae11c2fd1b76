//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature). Anything random takes an explicit [`SimRng`].

use crate::agv::Agv;
use crate::id::NodeId;
use crate::job::Job;
use crate::map::FactoryMap;
use crate::rng::SimRng;
use crate::sim::{SimConfig, SimulationOptions, SimulationReport, simulation};

// ===========================================================================
// Layouts
// ===========================================================================

/// The five nodes of a plus-shaped crossing.
#[derive(Debug, Clone, Copy)]
pub struct Crossroads {
    pub x: NodeId,
    pub t: NodeId,
    pub r: NodeId,
    pub b: NodeId,
    pub l: NodeId,
}

/// Centre `X` linked to `T`, `R`, `B`, `L`, created in that order.
pub fn crossroads() -> (FactoryMap, Crossroads) {
    let mut map = FactoryMap::new(5);
    let nodes = map.list_nodes();
    let c = Crossroads {
        x: nodes[0],
        t: nodes[1],
        r: nodes[2],
        b: nodes[3],
        l: nodes[4],
    };
    map.two_way_link(c.x, &[c.t, c.r, c.b, c.l])
        .expect("crossroads nodes exist");
    (map, c)
}

/// Link consecutive entries of `nodes`.
pub fn connect_chain(map: &mut FactoryMap, nodes: &[NodeId]) {
    for pair in nodes.windows(2) {
        map.two_way_link(pair[0], &[pair[1]])
            .expect("chain nodes exist");
    }
}

/// `n` nodes in a row.
pub fn line(n: usize) -> FactoryMap {
    let mut map = FactoryMap::new(n);
    let nodes = map.list_nodes();
    connect_chain(&mut map, &nodes);
    map
}

/// A `size` x `size` grid; node `row * size + col`, linked to its four
/// orthogonal neighbours.
pub fn make_grid(size: usize) -> FactoryMap {
    let mut map = FactoryMap::new(size * size);
    let nodes = map.list_nodes();
    let rows: Vec<&[NodeId]> = nodes.chunks(size).collect();
    for row in &rows {
        connect_chain(&mut map, row);
    }
    for col in 0..size {
        let column: Vec<NodeId> = rows.iter().map(|row| row[col]).collect();
        connect_chain(&mut map, &column);
    }
    map
}

/// Nodes with exactly two neighbours (the corners of a grid).
pub fn corners(map: &FactoryMap) -> Vec<NodeId> {
    map.list_adjacent_nodes()
        .into_iter()
        .filter(|(_, ngb)| ngb.len() == 2)
        .map(|(node, _)| node)
        .collect()
}

// ===========================================================================
// Random generators
// ===========================================================================

/// `n` distinct elements of `items`, in draw order.
///
/// # Panics
///
/// Panics unless `items.len() > n`.
pub fn sample<T: Copy>(rng: &mut SimRng, items: &[T], n: usize) -> Vec<T> {
    assert!(
        items.len() > n,
        "sample: items.len() must be bigger than n ({} <= {n})",
        items.len()
    );
    let mut taken = vec![false; items.len()];
    let mut result = Vec::with_capacity(n);
    while result.len() < n {
        let i = rng.index(items.len());
        if !taken[i] {
            taken[i] = true;
            result.push(items[i]);
        }
    }
    result
}

/// `count` jobs between distinct random members of `nodes`, arriving at
/// ticks `1..=count`.
pub fn random_jobs(rng: &mut SimRng, nodes: &[NodeId], count: usize) -> Vec<Job> {
    (0..count)
        .map(|i| {
            let picked = sample(rng, nodes, 2);
            Job::new(i as u64 + 1, picked[0], picked[1])
        })
        .collect()
}

// ===========================================================================
// Running
// ===========================================================================

/// Run a simulation that is known to be well-formed.
pub fn run(
    map: &mut FactoryMap,
    jobs: &mut [Job],
    agvs: &mut [Agv],
    config: SimConfig,
) -> SimulationReport {
    simulation(SimulationOptions {
        map,
        jobs,
        agvs,
        config,
    })
    .expect("valid simulation inputs")
}
