//! Resolution pipeline: reads a scenario file, checks node references, and
//! builds the map, fleet and job list.
//!
//! Provides format detection (RON/JSON/TOML) and the deserialization helper
//! used by [`load_scenario`].

use std::path::{Path, PathBuf};

use agvsim_core::agv::Agv;
use agvsim_core::id::NodeId;
use agvsim_core::job::Job;
use agvsim_core::map::{FactoryMap, MapError};
use agvsim_core::planner::{NoPlanning, Planner, ShortestPath};
use agvsim_core::sim::{
    SimConfig, SimError, SimulationOptions, SimulationReport, simulation,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::schema::ScenarioData;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading a scenario.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The node count does not fit the map's id space.
    #[error("too many nodes: {count}")]
    TooManyNodes { count: usize },

    /// A link, vehicle or job refers to a node index outside `0..nodes`.
    #[error("unknown node {node} referenced by {context}")]
    UnknownNode { node: usize, context: String },

    /// The map rejected a link (e.g. a node linked to itself).
    #[error("invalid link from node {node}: {source}")]
    InvalidLink { node: usize, source: MapError },

    /// Two vehicles were given the same start node.
    #[error("agv {index} cannot start on {node}: already occupied")]
    OccupiedStart { index: usize, node: NodeId },

    /// A vehicle names a planner we don't know.
    #[error("agv {index} uses unknown planner '{name}'")]
    UnknownPlanner { index: usize, name: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported scenario file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize `content` in the given format. `file` only labels errors.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    file: &Path,
) -> Result<T, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        file: file.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, path)
}

// ===========================================================================
// Scenario
// ===========================================================================

/// A resolved scenario, ready to run.
#[derive(Debug)]
pub struct Scenario {
    pub map: FactoryMap,
    pub agvs: Vec<Agv>,
    pub jobs: Vec<Job>,
    pub config: SimConfig,
}

impl Scenario {
    /// Borrow everything as simulation input.
    pub fn options(&mut self) -> SimulationOptions<'_> {
        SimulationOptions {
            map: &mut self.map,
            jobs: &mut self.jobs,
            agvs: &mut self.agvs,
            config: self.config.clone(),
        }
    }

    /// Run the scenario to completion. Job and vehicle state is left in
    /// place for inspection.
    pub fn run(&mut self) -> Result<SimulationReport, SimError> {
        simulation(self.options())
    }
}

/// Load and resolve a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario, DataLoadError> {
    let data: ScenarioData = deserialize_file(path)?;
    let scenario = resolve(data)?;
    debug!(file = %path.display(), "scenario loaded");
    Ok(scenario)
}

/// Parse and resolve a scenario held in memory.
pub fn parse_scenario(content: &str, format: Format) -> Result<Scenario, DataLoadError> {
    let data: ScenarioData = deserialize_str(content, format, Path::new("<inline>"))?;
    resolve(data)
}

/// Build core types from the raw file structs.
///
/// Links are applied in file order, then vehicles are placed (each locking
/// its start node), then jobs are created in file order so their ids follow
/// the file.
pub fn resolve(data: ScenarioData) -> Result<Scenario, DataLoadError> {
    if data.nodes >= u32::MAX as usize {
        return Err(DataLoadError::TooManyNodes { count: data.nodes });
    }
    let mut map = FactoryMap::new(data.nodes);

    for link in &data.links {
        let node = lookup(&map, link.node, || format!("link {}", link.node))?;
        let neighbours = link
            .neighbours
            .iter()
            .map(|&n| lookup(&map, n, || format!("link {}", link.node)))
            .collect::<Result<Vec<_>, _>>()?;
        map.two_way_link(node, &neighbours)
            .map_err(|source| DataLoadError::InvalidLink {
                node: link.node,
                source,
            })?;
    }

    let mut agvs = Vec::with_capacity(data.agvs.len());
    for (index, agv) in data.agvs.iter().enumerate() {
        let start = lookup(&map, agv.start, || format!("agv {index}"))?;
        let planner = planner_by_name(&agv.planner).ok_or_else(|| {
            DataLoadError::UnknownPlanner {
                index,
                name: agv.planner.clone(),
            }
        })?;
        let vehicle = Agv::with_boxed_planner(&mut map, start, planner).map_err(|e| match e {
            MapError::Occupied { node, .. } => DataLoadError::OccupiedStart { index, node },
            _ => DataLoadError::UnknownNode {
                node: agv.start,
                context: format!("agv {index}"),
            },
        })?;
        agvs.push(vehicle);
    }

    let jobs = data
        .jobs
        .iter()
        .enumerate()
        .map(|(index, job)| {
            let context = || format!("job {index}");
            let origin = lookup(&map, job.origin, context)?;
            let destination = lookup(&map, job.destination, context)?;
            Ok(Job::new(job.arrival, origin, destination))
        })
        .collect::<Result<Vec<_>, DataLoadError>>()?;

    debug!(
        nodes = map.node_count(),
        edges = map.edge_count(),
        agvs = agvs.len(),
        jobs = jobs.len(),
        "scenario resolved"
    );

    Ok(Scenario {
        map,
        agvs,
        jobs,
        config: data.sim,
    })
}

fn lookup(
    map: &FactoryMap,
    raw: usize,
    context: impl FnOnce() -> String,
) -> Result<NodeId, DataLoadError> {
    map.node(raw).ok_or_else(|| DataLoadError::UnknownNode {
        node: raw,
        context: context(),
    })
}

/// Planner names accepted in scenario files.
pub fn planner_by_name(name: &str) -> Option<Box<dyn Planner>> {
    match name {
        "shortest" => Some(Box::new(ShortestPath)),
        "none" => Some(Box::new(NoPlanning)),
        _ => None,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
