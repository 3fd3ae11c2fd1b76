//! Serde structs for scenario files.
//!
//! Nodes are referred to by their index, `0..nodes`. These structs are
//! deserialized from RON, JSON, or TOML and then resolved into core types by
//! the loader.

use agvsim_core::fixed::Ticks;
use agvsim_core::sim::SimConfig;
use serde::Deserialize;

/// A whole scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioData {
    /// Number of nodes on the floor.
    pub nodes: usize,
    #[serde(default)]
    pub links: Vec<LinkData>,
    #[serde(default)]
    pub agvs: Vec<AgvData>,
    #[serde(default)]
    pub jobs: Vec<JobData>,
    #[serde(default)]
    pub sim: SimConfig,
}

/// Two-way links from `node` to each of `neighbours`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkData {
    pub node: usize,
    pub neighbours: Vec<usize>,
}

/// A vehicle and the node it starts on.
#[derive(Debug, Clone, Deserialize)]
pub struct AgvData {
    pub start: usize,
    /// `"shortest"` (breadth-first search) or `"none"`.
    #[serde(default = "default_planner")]
    pub planner: String,
}

fn default_planner() -> String {
    "shortest".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobData {
    pub arrival: Ticks,
    pub origin: usize,
    pub destination: usize,
}
