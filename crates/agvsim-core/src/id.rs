use serde::{Deserialize, Serialize};

/// Identifies a location on the factory floor.
///
/// A `NodeId` is only meaningful relative to the [`FactoryMap`] that issued
/// it: every map operation checks it against the map's node range.
///
/// [`FactoryMap`]: crate::map::FactoryMap
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// A handle no map will ever accept.
    pub const INVALID: NodeId = NodeId(u32::MAX);

    /// Position of this node in its map's storage.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identifies a vehicle. Doubles as the holder identity in the lock table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgvId(pub u32);

impl std::fmt::Display for AgvId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agv{}", self.0)
    }
}

/// Position of a job in the job list handed to the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u32);

impl JobId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_order_by_index() {
        assert!(NodeId(0) < NodeId(1));
        assert_eq!(NodeId(7).index(), 7);
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(AgvId(0), "forklift");
        map.insert(AgvId(1), "tugger");
        assert_eq!(map[&AgvId(1)], "tugger");
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(NodeId(3).to_string(), "n3");
        assert_eq!(AgvId(2).to_string(), "agv2");
        assert_eq!(JobId(9).to_string(), "job9");
    }
}
