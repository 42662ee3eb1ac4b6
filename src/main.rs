use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rsu_sim::metrics::SimulationSummary;
use rsu_sim::reporters::cli;
use rsu_sim::scenario::{Pacing, Scenario, Variant};
use rsu_sim::SimHarness;

#[derive(Debug, Parser)]
#[command(author, version, about = "Simulate RSU flood mitigation", long_about = None)]
struct Cli {
    /// Path to the scenario TOML file
    #[arg(long)]
    scenario: PathBuf,

    /// Override the variant (ledger, baseline or flood)
    #[arg(long)]
    variant: Option<String>,

    /// Override the simulated run length in seconds
    #[arg(long)]
    duration_secs: Option<f64>,

    /// Write the JSON summary here
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the CSV summary here
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the JSON-lines event log here
    #[arg(long)]
    events: Option<PathBuf>,

    /// Pace ticks on the wall clock; ctrl-c stops the run
    #[arg(long)]
    realtime: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,rsu_sim=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let harness = SimHarness;
    let mut scenario = Scenario::from_path(&cli.scenario)?;

    if let Some(variant) = cli.variant.as_deref() {
        scenario.sim.variant =
            Variant::parse(variant).ok_or_else(|| anyhow!("unknown variant: {variant}"))?;
    }
    if let Some(duration_secs) = cli.duration_secs {
        scenario.sim.duration_secs = duration_secs;
    }
    if cli.realtime {
        scenario.sim.pacing = Pacing::Realtime;
    }

    if cli.output.is_some() || cli.csv.is_some() || cli.events.is_some() {
        let mut metrics = scenario.metrics.clone().unwrap_or_default();
        if let Some(output) = cli.output {
            metrics.json = Some(output);
        }
        if let Some(csv) = cli.csv {
            metrics.csv = Some(csv);
        }
        if let Some(events) = cli.events {
            metrics.events = Some(events);
        }
        scenario.metrics = Some(metrics);
    }
    scenario.validate()?;

    let summary: SimulationSummary = harness.run_scenario(scenario)?;

    println!("{}", cli::render_compact(&summary));

    Ok(())
}
