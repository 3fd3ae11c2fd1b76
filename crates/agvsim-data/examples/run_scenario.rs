//! Load a scenario file, run it, and print fleet statistics.
//!
//! ```text
//! cargo run -p agvsim-data --example run_scenario -- crates/agvsim-data/scenarios/crossroads.toml
//! ```

use std::path::PathBuf;

use agvsim_core::fixed::fixed64_to_f64;
use agvsim_data::load_scenario;
use agvsim_stats::{FleetStats, StatsConfig, job_latency};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: run_scenario <scenario.{toml,ron,json}>")?;

    let mut scenario = load_scenario(&path)?;
    let report = scenario.run()?;
    let stats = FleetStats::from_report(&report, StatsConfig::default());

    println!("ticks run:     {}", report.ticks_run);
    println!("completed:     {}/{}", report.completed, scenario.jobs.len());
    println!("throughput:    {:.3} jobs/tick", fixed64_to_f64(stats.throughput()));
    println!("peak occupied: {}", stats.peak_occupancy());
    if let Some(latency) = job_latency(&scenario.jobs) {
        println!(
            "latency:       mean {:.2}, max {}",
            fixed64_to_f64(latency.mean),
            latency.max
        );
    }
    for agv in &scenario.agvs {
        let totals = stats.agv_totals(agv.id());
        println!(
            "{}: at {} moves={} yields={} blocked={} delivered={} utilization={:.2}",
            agv.id(),
            agv.current_node(),
            totals.moves,
            totals.yields,
            totals.blocked_ticks,
            totals.deliveries,
            fixed64_to_f64(stats.utilization(agv.id()))
        );
    }
    Ok(())
}
