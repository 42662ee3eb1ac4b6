use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::runtime::Builder;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::fleet::FleetPlan;
use crate::graph::ScaleTransform;
use crate::metrics::{
    exporters, Collector, ResourceUsageMetrics, RsuRecord, RunOutcome, SimulationSummary,
    VehicleRecord,
};
use crate::rsu::Rsu;
use crate::scenario::{Pacing, Scenario};
use crate::simulator::Simulator;
use crate::vehicle::IdAllocator;

pub struct SimHarness;

impl SimHarness {
    pub fn run_from_path(&self, scenario_path: impl AsRef<Path>) -> Result<SimulationSummary> {
        let scenario = Scenario::from_path(&scenario_path)?;
        self.run_scenario(scenario)
    }

    pub fn run_scenario(&self, scenario: Scenario) -> Result<SimulationSummary> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")?;
        runtime.block_on(run(scenario))
    }
}

/// Builds the graph, fleet and RSU described by `scenario`.
pub fn build_simulator(scenario: &Scenario) -> Result<Simulator> {
    let graph = scenario.load_graph()?;
    let transform = ScaleTransform::fit(&graph, scenario.graph.width, scenario.graph.height)?;
    let positions = graph.scaled_positions(&transform);

    let plan: FleetPlan = scenario.fleet_plan()?;
    let mut ids = IdAllocator::new();
    let vehicles = plan
        .build(&positions, &mut ids)
        .with_context(|| format!("failed to lay out {} fleet", scenario.variant()))?;

    let rsu = Rsu::new(scenario.rsu.position(), scenario.admission());
    let simulator = Simulator::new(scenario.simulator_config()?, rsu, vehicles)?;
    Ok(simulator)
}

async fn run(scenario: Scenario) -> Result<SimulationSummary> {
    tracing_subscriber::fmt::try_init().ok();

    let variant = scenario.variant();
    let mut simulator = build_simulator(&scenario)?;
    let outputs = scenario.metrics_outputs();
    let mut collector = Collector::new(outputs.events.is_some());

    info!(
        target = "rsu::sim::harness",
        variant = %variant,
        vehicles = simulator.vehicles().len(),
        nodes_required = scenario.fleet_plan()?.required_nodes(),
        pacing = ?scenario.sim.pacing,
        "starting simulation"
    );

    let start = Instant::now();
    match scenario.sim.pacing {
        Pacing::Fast => {
            while simulator.step() {
                for event in simulator.drain_events() {
                    collector.ingest(event);
                }
            }
        }
        Pacing::Realtime => run_paced(&mut simulator, &mut collector).await,
    }
    let end = Instant::now();

    if let Some(resource_usage) = capture_resource_usage(start, end) {
        collector.record_resource_usage(resource_usage);
    }
    let summary = collector.finalize(RunOutcome {
        variant: variant.to_string(),
        ticks: simulator.tick(),
        elapsed: simulator.now(),
        stopped_early: simulator.stopped_early(),
        vehicles: simulator.vehicles().iter().map(VehicleRecord::from).collect(),
        rsu: RsuRecord::from(simulator.rsu()),
    });

    info!(
        target = "rsu::sim::harness",
        variant = %variant,
        ticks = summary.ticks,
        sent = summary.total_sent(),
        received = summary.total_received(),
        dropped = summary.total_dropped(),
        revocations = summary.revocations.len(),
        rsu_operational = summary.rsu.operational,
        "simulation finished"
    );

    if let Some(json_path) = &outputs.json {
        exporters::export_json(json_path, &summary)
            .with_context(|| format!("failed to write summary {json_path:?}"))?;
    }
    if let Some(csv_path) = &outputs.csv {
        exporters::export_csv(csv_path, &summary)
            .with_context(|| format!("failed to write summary {csv_path:?}"))?;
    }
    if let Some(events_path) = &outputs.events {
        exporters::export_events(events_path, collector.event_log())
            .with_context(|| format!("failed to write event log {events_path:?}"))?;
    }

    Ok(summary)
}

/// Steps once per tick interval of wall-clock time until the run ends or
/// ctrl-c raises the stop signal.
async fn run_paced(simulator: &mut Simulator, collector: &mut Collector) {
    let stop = simulator.stop_signal();
    let mut ticker = tokio::time::interval(simulator.config().tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ctrl_c_armed = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !simulator.step() {
                    break;
                }
                for event in simulator.drain_events() {
                    collector.ingest(event);
                }
            }
            result = &mut ctrl_c, if ctrl_c_armed => {
                ctrl_c_armed = false;
                match result {
                    Ok(()) => {
                        warn!(
                            target = "rsu::sim::harness",
                            tick = simulator.tick(),
                            "interrupted, stopping simulation"
                        );
                        stop.raise();
                    }
                    Err(err) => {
                        warn!(target = "rsu::sim::harness", "ctrl-c handler unavailable: {err}");
                    }
                }
            }
        }
    }
}

#[cfg(unix)]
fn capture_resource_usage(start: Instant, end: Instant) -> Option<ResourceUsageMetrics> {
    use std::mem::MaybeUninit;

    let mut usage = MaybeUninit::<libc::rusage>::uninit();
    let result = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if result != 0 {
        warn!(target = "rsu::sim::harness", "getrusage failed: {result}");
        return None;
    }
    let usage = unsafe { usage.assume_init() };
    let cpu_time_secs = timeval_to_secs(usage.ru_utime) + timeval_to_secs(usage.ru_stime);
    let wall_time_secs = end.duration_since(start).as_secs_f64();
    let avg_cpu_percent = if wall_time_secs > 0.0 {
        (cpu_time_secs / wall_time_secs) * 100.0
    } else {
        0.0
    };
    let max_rss_bytes = (usage.ru_maxrss as u64).saturating_mul(1024);

    Some(ResourceUsageMetrics {
        cpu_time_secs,
        wall_time_secs,
        avg_cpu_percent,
        max_rss_bytes,
    })
}

#[cfg(not(unix))]
fn capture_resource_usage(_start: Instant, _end: Instant) -> Option<ResourceUsageMetrics> {
    None
}

#[cfg(unix)]
fn timeval_to_secs(value: libc::timeval) -> f64 {
    value.tv_sec as f64 + value.tv_usec as f64 / 1_000_000.0
}
