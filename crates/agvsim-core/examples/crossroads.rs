//! Two vehicles cross a plus-shaped junction, then the run summary is printed.
//!
//! Run with `RUST_LOG=debug cargo run --example crossroads` to see every
//! assignment, pickup and delivery.

use agvsim_core::agv::Agv;
use agvsim_core::job::Job;
use agvsim_core::planner::ShortestPath;
use agvsim_core::sim::{SimConfig, SimulationOptions, simulation};
use agvsim_core::test_utils::crossroads;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (mut map, c) = crossroads();
    let mut jobs = vec![Job::new(1, c.t, c.l), Job::new(1, c.b, c.r), Job::new(3, c.l, c.b)];
    let mut agvs = vec![
        Agv::new(&mut map, c.t, ShortestPath)?,
        Agv::new(&mut map, c.b, ShortestPath)?,
    ];

    let report = simulation(SimulationOptions {
        map: &mut map,
        jobs: &mut jobs,
        agvs: &mut agvs,
        config: SimConfig::new(12),
    })?;

    println!("ticks run: {}", report.ticks_run);
    for (i, job) in jobs.iter().enumerate() {
        match job.completion_time() {
            Some(t) => println!("job {i}: {} -> {} done at tick {t}", job.origin, job.destination),
            None => println!("job {i}: {} -> {} unfinished", job.origin, job.destination),
        }
    }
    for row in &report.counters {
        println!(
            "tick {:>2}: occupied={} moves={} blocked={} yields={} done={}",
            row.tick, row.occupied, row.moves, row.blocked, row.yields, row.completions
        );
    }
    Ok(())
}
