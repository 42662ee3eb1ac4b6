use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::errors::{SetupError, SetupResult};
use crate::fleet::FleetPlan;
use crate::graph::{GraphNode, RoadGraph, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::motion::{Point, DEFAULT_STEP};
use crate::rsu::{Admission, CapacityGate, Ledger, DEFAULT_CAPACITY, DEFAULT_MISBEHAVIOR_THRESHOLD};
use crate::simulator::{SimulatorConfig, DEFAULT_RANGE};
use crate::vehicle::SendPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub sim: SimSection,
    #[serde(default)]
    pub rsu: RsuSection,
    #[serde(default)]
    pub fleet: FleetSection,
    pub graph: GraphSection,
    #[serde(default)]
    pub metrics: Option<MetricsSection>,
    /// Directory relative graph paths are resolved against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Per-sender revocation, mixed fleet.
    Ledger,
    /// Capacity gate, legitimate vehicles only.
    Baseline,
    /// Capacity gate, mixed fleet.
    Flood,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Ledger => "ledger",
            Variant::Baseline => "baseline",
            Variant::Flood => "flood",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "ledger" | "mitigated" => Some(Variant::Ledger),
            "baseline" => Some(Variant::Baseline),
            "flood" | "ddos" => Some(Variant::Flood),
            _ => None,
        }
    }

    pub fn admission(self, rsu: &RsuSection) -> Admission {
        match self {
            Variant::Ledger => Admission::Ledger(Ledger::new(rsu.misbehavior_threshold)),
            Variant::Baseline | Variant::Flood => {
                Admission::Capacity(CapacityGate::new(rsu.capacity))
            }
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Ticks back to back.
    #[default]
    Fast,
    /// One tick per tick interval of wall-clock time.
    Realtime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimSection {
    #[serde(default = "default_variant")]
    pub variant: Variant,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default)]
    pub pacing: Pacing,
}

impl Default for SimSection {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            duration_secs: default_duration_secs(),
            tick_ms: default_tick_ms(),
            pacing: Pacing::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RsuSection {
    #[serde(default = "default_rsu_x")]
    pub x: f64,
    #[serde(default = "default_rsu_y")]
    pub y: f64,
    #[serde(default = "default_range")]
    pub range: f64,
    #[serde(default = "default_capacity")]
    pub capacity: u64,
    #[serde(default = "default_threshold")]
    pub misbehavior_threshold: u64,
}

impl Default for RsuSection {
    fn default() -> Self {
        Self {
            x: default_rsu_x(),
            y: default_rsu_y(),
            range: default_range(),
            capacity: default_capacity(),
            misbehavior_threshold: default_threshold(),
        }
    }
}

impl RsuSection {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FleetSection {
    #[serde(default = "default_fleet_size")]
    pub malicious: usize,
    #[serde(default = "default_fleet_size")]
    pub legitimate: usize,
    #[serde(default = "default_malicious_interval")]
    pub malicious_interval_secs: f64,
    #[serde(default = "default_legitimate_interval")]
    pub legitimate_interval_secs: f64,
    #[serde(default = "default_step")]
    pub step: f64,
}

impl Default for FleetSection {
    fn default() -> Self {
        Self {
            malicious: default_fleet_size(),
            legitimate: default_fleet_size(),
            malicious_interval_secs: default_malicious_interval(),
            legitimate_interval_secs: default_legitimate_interval(),
            step: default_step(),
        }
    }
}

/// Either a `path` to a graph file or inline `nodes`/`edges`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphSection {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<(String, String)>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsSection {
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    /// JSON-lines event log.
    pub events: Option<PathBuf>,
}

fn default_variant() -> Variant {
    Variant::Ledger
}

fn default_duration_secs() -> f64 {
    10.0
}

fn default_tick_ms() -> u64 {
    10
}

fn default_rsu_x() -> f64 {
    crate::rsu::DEFAULT_RSU_POSITION.x
}

fn default_rsu_y() -> f64 {
    crate::rsu::DEFAULT_RSU_POSITION.y
}

fn default_range() -> f64 {
    DEFAULT_RANGE
}

fn default_capacity() -> u64 {
    DEFAULT_CAPACITY
}

fn default_threshold() -> u64 {
    DEFAULT_MISBEHAVIOR_THRESHOLD
}

fn default_fleet_size() -> usize {
    5
}

fn default_malicious_interval() -> f64 {
    0.0001
}

fn default_legitimate_interval() -> f64 {
    0.05
}

fn default_step() -> f64 {
    DEFAULT_STEP
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

fn positive_secs(name: &str, value: f64) -> SetupResult<Duration> {
    if !(value > 0.0) {
        return Err(SetupError::Config(format!(
            "{name} must be positive (got {value})"
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|err| SetupError::Config(format!("{name} is out of range: {err}")))
}

impl Scenario {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario file {path:?}"))?;
        let mut scenario = Self::from_toml(&contents)
            .with_context(|| format!("failed to load scenario file {path:?}"))?;
        scenario.base_dir = path.parent().map(Path::to_path_buf);
        Ok(scenario)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(contents).context("failed to parse scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> SetupResult<()> {
        self.simulator_config()?;
        self.fleet_plan()?;
        if self.rsu.capacity == 0 {
            return Err(SetupError::Config("RSU capacity must be positive".into()));
        }
        if self.rsu.misbehavior_threshold == 0 {
            return Err(SetupError::Config(
                "misbehavior threshold must be positive".into(),
            ));
        }
        if !self.rsu.x.is_finite() || !self.rsu.y.is_finite() {
            return Err(SetupError::NonFiniteCoordinate("rsu".into()));
        }
        if self.graph.width == 0 || self.graph.height == 0 {
            return Err(SetupError::Config("screen extent must be non-zero".into()));
        }
        if self.graph.path.is_none() && self.graph.nodes.is_empty() {
            return Err(SetupError::EmptyGraph);
        }
        Ok(())
    }

    pub fn variant(&self) -> Variant {
        self.sim.variant
    }

    pub fn simulator_config(&self) -> SetupResult<SimulatorConfig> {
        if self.sim.tick_ms == 0 {
            return Err(SetupError::Config("tick_ms must be positive".into()));
        }
        let config = SimulatorConfig {
            tick: Duration::from_millis(self.sim.tick_ms),
            duration: positive_secs("duration_secs", self.sim.duration_secs)?,
            range: self.rsu.range,
        };
        config.validate()?;
        Ok(config)
    }

    /// Fleet composition for the configured variant. The baseline variant
    /// ignores the malicious count.
    pub fn fleet_plan(&self) -> SetupResult<FleetPlan> {
        let fleet = &self.fleet;
        let mut plan = match self.sim.variant {
            Variant::Baseline => FleetPlan::legitimate_only(fleet.legitimate),
            Variant::Ledger | Variant::Flood => FleetPlan::mixed(fleet.malicious, fleet.legitimate),
        };
        plan.malicious_policy = SendPolicy::new(positive_secs(
            "malicious_interval_secs",
            fleet.malicious_interval_secs,
        )?);
        plan.legitimate_policy = SendPolicy::new(positive_secs(
            "legitimate_interval_secs",
            fleet.legitimate_interval_secs,
        )?);
        if !(fleet.step > 0.0 && fleet.step.is_finite()) {
            return Err(SetupError::Config(format!(
                "vehicle step must be positive (got {})",
                fleet.step
            )));
        }
        plan.step = fleet.step;
        Ok(plan)
    }

    pub fn admission(&self) -> Admission {
        self.sim.variant.admission(&self.rsu)
    }

    /// Loads the road graph from `graph.path` (relative to the scenario file)
    /// or from the inline node list.
    pub fn load_graph(&self) -> Result<RoadGraph> {
        match &self.graph.path {
            Some(path) => {
                let resolved = match &self.base_dir {
                    Some(base) if path.is_relative() => base.join(path),
                    _ => path.clone(),
                };
                RoadGraph::from_path(&resolved)
            }
            None => {
                let graph = RoadGraph {
                    nodes: self.graph.nodes.clone(),
                    edges: self.graph.edges.clone(),
                };
                graph.validate()?;
                Ok(graph)
            }
        }
    }

    pub fn metrics_outputs(&self) -> MetricsSection {
        self.metrics.clone().unwrap_or_default()
    }
}
