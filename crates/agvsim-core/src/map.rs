//! The factory floor: an undirected graph of nodes plus the occupancy table.
//!
//! Every node can be held by at most one vehicle. Holding is modelled as a
//! non-blocking lock: [`FactoryMap::try_lock`] either succeeds immediately or
//! reports failure, and [`FactoryMap::unlock`] only releases a node for its
//! current holder. The lock table is private to the map so the
//! one-holder-per-node invariant is enforced in exactly one place.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{trace, warn};

use crate::id::{AgvId, NodeId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during map operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("invalid node: {0}")]
    InvalidNode(NodeId),
    #[error("node {0} cannot be linked to itself")]
    SelfLink(NodeId),
    #[error("node {node} is already occupied by {holder}")]
    Occupied { node: NodeId, holder: AgvId },
}

// ---------------------------------------------------------------------------
// FactoryMap
// ---------------------------------------------------------------------------

/// A fixed set of nodes, the undirected links between them, and the table
/// recording which vehicle currently occupies each node.
///
/// Neighbour sets are ordered so that every traversal of the map (and
/// therefore every planned route) is reproducible.
#[derive(Debug, Clone)]
pub struct FactoryMap {
    adjacency: Vec<BTreeSet<NodeId>>,
    locks: Vec<Option<AgvId>>,
    edge_count: usize,
    /// Next identity handed out by [`FactoryMap::spawn_holder`].
    next_holder: u32,
}

impl FactoryMap {
    /// Create a map with `node_count` nodes and no links.
    ///
    /// # Panics
    ///
    /// Panics if `node_count` does not leave room for [`NodeId::INVALID`].
    pub fn new(node_count: usize) -> Self {
        assert!(
            node_count < u32::MAX as usize,
            "FactoryMap supports at most {} nodes",
            u32::MAX - 1
        );
        Self {
            adjacency: vec![BTreeSet::new(); node_count],
            locks: vec![None; node_count],
            edge_count: 0,
            next_holder: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Topology
    // -----------------------------------------------------------------------

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected links.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Whether `node` belongs to this map.
    #[inline]
    pub fn contains(&self, node: NodeId) -> bool {
        node.index() < self.adjacency.len()
    }

    /// Look up the node at position `raw`, if the map has one there.
    pub fn node(&self, raw: usize) -> Option<NodeId> {
        (raw < self.adjacency.len()).then(|| NodeId(raw as u32))
    }

    /// All nodes in creation order.
    pub fn list_nodes(&self) -> Vec<NodeId> {
        (0..self.adjacency.len() as u32).map(NodeId).collect()
    }

    /// Link `node` to each of `neighbours` in both directions.
    ///
    /// Re-adding an existing link is a no-op. The call is validated as a
    /// whole before anything is mutated: one bad endpoint rejects every link.
    pub fn two_way_link(&mut self, node: NodeId, neighbours: &[NodeId]) -> Result<(), MapError> {
        if let Err(err) = self.validate_link(node, neighbours) {
            warn!(%node, %err, "link rejected");
            return Err(err);
        }
        for &other in neighbours {
            if self.adjacency[node.index()].insert(other) {
                self.adjacency[other.index()].insert(node);
                self.edge_count += 1;
            }
        }
        Ok(())
    }

    fn validate_link(&self, node: NodeId, neighbours: &[NodeId]) -> Result<(), MapError> {
        if !self.contains(node) {
            return Err(MapError::InvalidNode(node));
        }
        for &other in neighbours {
            if !self.contains(other) {
                return Err(MapError::InvalidNode(other));
            }
            if other == node {
                return Err(MapError::SelfLink(node));
            }
        }
        Ok(())
    }

    /// The nodes directly linked to `node`, in ascending order.
    pub fn neighbours(&self, node: NodeId) -> Result<&BTreeSet<NodeId>, MapError> {
        self.adjacency
            .get(node.index())
            .ok_or(MapError::InvalidNode(node))
    }

    /// Snapshot of the full adjacency relation.
    pub fn list_adjacent_nodes(&self) -> BTreeMap<NodeId, BTreeSet<NodeId>> {
        self.adjacency
            .iter()
            .enumerate()
            .map(|(i, ngb)| (NodeId(i as u32), ngb.clone()))
            .collect()
    }

    pub fn are_adjacent(&self, a: NodeId, b: NodeId) -> bool {
        self.adjacency
            .get(a.index())
            .is_some_and(|ngb| ngb.contains(&b))
    }

    // -----------------------------------------------------------------------
    // Occupancy
    // -----------------------------------------------------------------------

    /// Take `node` for `holder`.
    ///
    /// Succeeds when the node is free or already held by `holder`. Fails
    /// (without any state change) when another vehicle holds it or when the
    /// node does not belong to this map.
    pub fn try_lock(&mut self, node: NodeId, holder: AgvId) -> bool {
        let Some(slot) = self.locks.get_mut(node.index()) else {
            return false;
        };
        match *slot {
            None => {
                *slot = Some(holder);
                true
            }
            Some(current) => current == holder,
        }
    }

    /// Release `node` if `holder` holds it. Anything else is a no-op.
    pub fn unlock(&mut self, node: NodeId, holder: AgvId) {
        match self.locks.get_mut(node.index()) {
            Some(slot) if *slot == Some(holder) => *slot = None,
            _ => trace!(%node, %holder, "stale release ignored"),
        }
    }

    /// The vehicle currently holding `node`, if any.
    pub fn holder(&self, node: NodeId) -> Option<AgvId> {
        self.locks.get(node.index()).copied().flatten()
    }

    pub fn is_free(&self, node: NodeId) -> bool {
        self.contains(node) && self.holder(node).is_none()
    }

    /// Every held node with its holder, ascending by node.
    pub fn held_nodes(&self) -> Vec<(NodeId, AgvId)> {
        self.locks
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|agv| (NodeId(i as u32), agv)))
            .collect()
    }

    pub fn occupied_count(&self) -> usize {
        self.locks.iter().filter(|slot| slot.is_some()).count()
    }

    /// Hand out a fresh holder identity standing on `start`.
    ///
    /// Used by [`Agv::new`](crate::agv::Agv::new) so that a vehicle holds
    /// its starting node from the moment it exists.
    pub(crate) fn spawn_holder(&mut self, start: NodeId) -> Result<AgvId, MapError> {
        if !self.contains(start) {
            return Err(MapError::InvalidNode(start));
        }
        if let Some(holder) = self.holder(start) {
            return Err(MapError::Occupied { node: start, holder });
        }
        let id = AgvId(self.next_holder);
        self.next_holder += 1;
        self.locks[start.index()] = Some(id);
        Ok(id)
    }
}
