//! Cross-crate tests: scenario files are loaded by `agvsim-data`, run by
//! `agvsim-core`, and summarized by `agvsim-stats`.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use agvsim_core::event::{Event, EventKind};
use agvsim_core::fixed::{Fixed64, ratio};
use agvsim_core::id::{AgvId, NodeId};
use agvsim_core::sim::Simulation;
use agvsim_data::{Format, Scenario, load_scenario, parse_scenario};
use agvsim_stats::{FleetStats, StatsConfig, job_latency};

fn bundled(name: &str) -> Scenario {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../agvsim-data/scenarios")
        .join(name);
    load_scenario(&path).unwrap()
}

/// A 2x3 grid with one vehicle, written once per format.
///
/// ```text
/// 0 - 1 - 2
/// |   |   |
/// 3 - 4 - 5
/// ```
const GRID_TOML: &str = r#"
nodes = 6

[[links]]
node = 1
neighbours = [0, 2, 4]

[[links]]
node = 3
neighbours = [0, 4]

[[links]]
node = 5
neighbours = [2, 4]

[[agvs]]
start = 4

[[jobs]]
arrival = 0
origin = 0
destination = 5

[[jobs]]
arrival = 2
origin = 2
destination = 3

[sim]
iteration_cnt = 20
"#;

const GRID_JSON: &str = r#"{
    "nodes": 6,
    "links": [
        { "node": 1, "neighbours": [0, 2, 4] },
        { "node": 3, "neighbours": [0, 4] },
        { "node": 5, "neighbours": [2, 4] }
    ],
    "agvs": [{ "start": 4 }],
    "jobs": [
        { "arrival": 0, "origin": 0, "destination": 5 },
        { "arrival": 2, "origin": 2, "destination": 3 }
    ],
    "sim": { "iteration_cnt": 20 }
}"#;

const GRID_RON: &str = r#"(
    nodes: 6,
    links: [
        (node: 1, neighbours: [0, 2, 4]),
        (node: 3, neighbours: [0, 4]),
        (node: 5, neighbours: [2, 4]),
    ],
    agvs: [(start: 4, planner: "shortest")],
    jobs: [
        (arrival: 0, origin: 0, destination: 5),
        (arrival: 2, origin: 2, destination: 3),
    ],
    sim: (iteration_cnt: 20),
)"#;

// ===========================================================================
// Bundled crossroads scenario
// ===========================================================================

#[test]
fn crossroads_scenario_end_to_end() {
    let mut scenario = bundled("crossroads.toml");
    let report = scenario.run().unwrap();

    let done: Vec<_> = scenario.jobs.iter().map(|j| j.completion_time()).collect();
    assert_eq!(done, vec![Some(2), Some(3), Some(5)]);
    assert_eq!(report.completed, 3);
    assert_eq!(report.ticks_run, 30);

    let stats = FleetStats::from_report(&report, StatsConfig::default());
    assert_eq!(stats.total_completions(), 3);
    assert_eq!(stats.peak_occupancy(), 2);
    assert_eq!(stats.agv_totals(AgvId(0)).moves, 4);
    assert_eq!(stats.agv_totals(AgvId(0)).deliveries, 2);
    assert_eq!(stats.agv_totals(AgvId(1)).moves, 2);
    assert_eq!(stats.agv_totals(AgvId(1)).blocked_ticks, 1);
    assert_eq!(stats.mean_service_time(), Some(ratio(4, 3)));
    assert_eq!(stats.max_service_time(), Some(2));
    assert_eq!(stats.throughput(), ratio(3, 30));

    let latency = job_latency(&scenario.jobs).unwrap();
    assert_eq!(latency.completed, 3);
    assert_eq!(latency.max, 2);
}

#[test]
fn crossroads_scenario_leaves_vehicles_parked() {
    let mut scenario = bundled("crossroads.toml");
    scenario.run().unwrap();

    // Vehicle 0 ends on the top arm, vehicle 1 on the right arm.
    assert_eq!(scenario.agvs[0].current_node(), NodeId(1));
    assert_eq!(scenario.agvs[1].current_node(), NodeId(2));
    assert_eq!(
        scenario.map.held_nodes(),
        vec![(NodeId(1), AgvId(0)), (NodeId(2), AgvId(1))]
    );
    assert!(scenario.agvs.iter().all(|a| a.is_idle()));
}

#[test]
fn passive_listener_sees_every_delivered_event() {
    let mut scenario = bundled("crossroads.toml");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    let mut sim = Simulation::new(scenario.options()).unwrap();
    sim.on_event(Box::new(move |event: &Event| {
        sink.borrow_mut().push(event.clone());
    }));
    let report = sim.run();

    assert_eq!(*seen.borrow(), report.events);
    let completions = seen
        .borrow()
        .iter()
        .filter(|e| e.kind() == EventKind::JobCompleted)
        .count();
    assert_eq!(completions, 3);
}

#[test]
fn stats_can_follow_a_run_tick_by_tick() {
    let mut scenario = bundled("crossroads.toml");
    let mut sim = Simulation::new(scenario.options()).unwrap();
    let mut stats = FleetStats::new(StatsConfig {
        window_size: 5,
        history_capacity: 8,
    });

    let mut completed = Vec::new();
    while !sim.is_finished() {
        sim.step();
        completed.push(sim.jobs().iter().filter(|j| j.is_completed()).count());
    }
    assert!(completed.windows(2).all(|w| w[0] <= w[1]));
    let report = sim.into_report();
    stats.ingest(&report);

    assert_eq!(stats.ticks_observed(), 30);
    assert_eq!(stats.throughput_history().len(), 8);
    // Nothing completes in the last five ticks.
    assert_eq!(stats.throughput(), Fixed64::ZERO);
    assert_eq!(stats.utilization(AgvId(0)), Fixed64::ZERO);
    assert_eq!(stats.total_completions(), 3);
}

// ===========================================================================
// Formats
// ===========================================================================

#[test]
fn all_formats_describe_the_same_run() {
    let reports: Vec<_> = [
        (GRID_TOML, Format::Toml),
        (GRID_JSON, Format::Json),
        (GRID_RON, Format::Ron),
    ]
    .into_iter()
    .map(|(text, format)| {
        let mut scenario = parse_scenario(text, format).unwrap();
        let report = scenario.run().unwrap();
        (scenario.jobs, report)
    })
    .collect();

    assert_eq!(reports[0], reports[1]);
    assert_eq!(reports[1], reports[2]);

    let (jobs, report) = &reports[0];
    let done: Vec<_> = jobs.iter().map(|j| j.completion_time()).collect();
    assert_eq!(done, vec![Some(4), Some(8)]);
    assert_eq!(report.completed, 2);
}

#[test]
fn skip_statistics_from_file_config() {
    let text = GRID_TOML.replace("iteration_cnt = 20", "iteration_cnt = 20\nskip_statistics = true");
    let mut scenario = parse_scenario(&text, Format::Toml).unwrap();
    let report = scenario.run().unwrap();

    assert!(report.events.is_empty());
    assert!(report.counters.is_empty());
    assert_eq!(report.completed, 2);
    assert_eq!(
        FleetStats::from_report(&report, StatsConfig::default()).total_completions(),
        0
    );
}

#[test]
fn planner_none_keeps_jobs_waiting() {
    let text = GRID_TOML.replace("start = 4", "start = 4\nplanner = \"none\"");
    let mut scenario = parse_scenario(&text, Format::Toml).unwrap();
    scenario.run().unwrap();

    // Job 0 is handed to the vehicle but never reached.
    assert!(scenario.jobs.iter().all(|j| !j.is_completed()));
    assert_eq!(scenario.agvs[0].current_node(), NodeId(4));
    assert_eq!(scenario.agvs[0].odometer(), 0);
}
