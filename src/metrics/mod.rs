pub mod collector;
pub mod exporters;
pub mod reduce;

pub use collector::{Collector, EventRecord, RunOutcome, SimEvent};
pub use reduce::{
    ClassTotals, EventTotals, ResourceUsageMetrics, RevocationRecord, RsuRecord,
    SimulationSummary, VehicleRecord,
};
