//! Roadside-unit flood-mitigation simulator.
//!
//! Vehicles follow cyclic paths over a scaled road graph and send messages to
//! a single RSU whenever they are in range. The RSU either revokes flooding
//! senders through a per-sender [`rsu::Ledger`] or counts every message
//! against a global [`rsu::CapacityGate`] until it goes dark.
//!
//! [`SimHarness`] runs a [`scenario::Scenario`] end to end; [`Simulator`] can
//! be driven tick by tick for embedding or visualisation.

pub mod errors;
pub mod fleet;
pub mod graph;
pub mod harness;
pub mod metrics;
pub mod motion;
pub mod reporters;
pub mod rsu;
pub mod scenario;
pub mod simulator;
pub mod vehicle;

pub use errors::{SetupError, SetupResult};
pub use harness::SimHarness;
pub use simulator::{Simulator, SimulatorConfig, StopSignal, TickSnapshot};
