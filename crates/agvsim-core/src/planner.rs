//! Route planning strategies.
//!
//! A [`Planner`] maps `(map, origin, destination)` to the full sequence of
//! nodes a vehicle should visit, `origin` first and `destination` last. Each
//! vehicle owns its planner, so strategies can be mixed within one fleet.
//!
//! # Planners
//!
//! - [`ShortestPath`] -- fewest hops, ties broken towards lower node ids
//! - [`NoPlanning`] -- always returns an empty route (vehicle never moves)
//!
//! Any `Fn(&FactoryMap, NodeId, NodeId) -> Result<Vec<NodeId>, PlanError>`
//! is also a planner.

use std::collections::VecDeque;

use crate::id::NodeId;
use crate::map::FactoryMap;

/// Errors that can occur while planning a route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("no path from {origin} to {destination}")]
    NoPathFound { origin: NodeId, destination: NodeId },
    #[error("invalid node: {0}")]
    InvalidNode(NodeId),
    #[error("planner returned a malformed route from {origin} to {destination}")]
    MalformedRoute { origin: NodeId, destination: NodeId },
}

/// A route planning strategy.
pub trait Planner: std::fmt::Debug {
    /// Plan a route from `origin` to `destination`, both inclusive.
    fn plan(
        &self,
        map: &FactoryMap,
        origin: NodeId,
        destination: NodeId,
    ) -> Result<Vec<NodeId>, PlanError>;
}

// ---------------------------------------------------------------------------
// ShortestPath
// ---------------------------------------------------------------------------

/// Breadth-first search over the unweighted floor graph.
///
/// Neighbours are expanded in ascending order and the first discovery of a
/// node wins, so among equally short routes the one through lower-numbered
/// nodes is chosen.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestPath;

impl Planner for ShortestPath {
    fn plan(
        &self,
        map: &FactoryMap,
        origin: NodeId,
        destination: NodeId,
    ) -> Result<Vec<NodeId>, PlanError> {
        plan_shortest_path(map, origin, destination)
    }
}

/// Fewest-hop route from `origin` to `destination`.
pub fn plan_shortest_path(
    map: &FactoryMap,
    origin: NodeId,
    destination: NodeId,
) -> Result<Vec<NodeId>, PlanError> {
    for node in [origin, destination] {
        if !map.contains(node) {
            return Err(PlanError::InvalidNode(node));
        }
    }
    if origin == destination {
        return Ok(vec![origin]);
    }

    let mut parent: Vec<Option<NodeId>> = vec![None; map.node_count()];
    let mut visited = vec![false; map.node_count()];
    let mut queue = VecDeque::new();
    visited[origin.index()] = true;
    queue.push_back(origin);

    while let Some(node) = queue.pop_front() {
        for &next in map.neighbours(node).map_err(|_| PlanError::InvalidNode(node))? {
            if visited[next.index()] {
                continue;
            }
            visited[next.index()] = true;
            parent[next.index()] = Some(node);
            if next == destination {
                return Ok(unwind(&parent, destination));
            }
            queue.push_back(next);
        }
    }

    Err(PlanError::NoPathFound { origin, destination })
}

/// Walk the parent links back from `destination` and reverse.
fn unwind(parent: &[Option<NodeId>], destination: NodeId) -> Vec<NodeId> {
    let mut route = vec![destination];
    let mut cursor = destination;
    while let Some(prev) = parent[cursor.index()] {
        route.push(prev);
        cursor = prev;
    }
    route.reverse();
    route
}

// ---------------------------------------------------------------------------
// NoPlanning
// ---------------------------------------------------------------------------

/// Returns an empty route for every request. A vehicle using it never
/// leaves its starting node, which is useful for exercising occupancy alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlanning;

impl Planner for NoPlanning {
    fn plan(&self, _: &FactoryMap, _: NodeId, _: NodeId) -> Result<Vec<NodeId>, PlanError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Closures
// ---------------------------------------------------------------------------

/// Wraps a plain function or closure as a [`Planner`].
pub struct FnPlanner<F>(pub F);

impl<F> std::fmt::Debug for FnPlanner<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnPlanner")
    }
}

impl<F> Planner for FnPlanner<F>
where
    F: Fn(&FactoryMap, NodeId, NodeId) -> Result<Vec<NodeId>, PlanError>,
{
    fn plan(
        &self,
        map: &FactoryMap,
        origin: NodeId,
        destination: NodeId,
    ) -> Result<Vec<NodeId>, PlanError> {
        (self.0)(map, origin, destination)
    }
}

// ---------------------------------------------------------------------------
// Route validation
// ---------------------------------------------------------------------------

/// Check that `route` runs from `origin` to `destination` over adjacent hops.
///
/// An empty route is accepted: it means "stay put".
pub fn validate_route(
    map: &FactoryMap,
    route: &[NodeId],
    origin: NodeId,
    destination: NodeId,
) -> Result<(), PlanError> {
    let (Some(&first), Some(&last)) = (route.first(), route.last()) else {
        return Ok(());
    };
    let connected = route.windows(2).all(|w| map.are_adjacent(w[0], w[1]));
    if first != origin || last != destination || !connected {
        return Err(PlanError::MalformedRoute { origin, destination });
    }
    Ok(())
}
