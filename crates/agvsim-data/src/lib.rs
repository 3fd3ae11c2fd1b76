//! Scenario files for the AGV simulation.
//!
//! A scenario describes a factory floor, a fleet and a job list, plus run
//! parameters. It can be written in RON, TOML or JSON; the format is picked
//! from the file extension. [`load_scenario`] reads and resolves one into
//! ready-to-run core types.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, Format, Scenario, load_scenario, parse_scenario};
