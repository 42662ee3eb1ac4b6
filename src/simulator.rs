//! Tick-driven simulation loop.
//!
//! Each tick runs at simulated time `tick * config.tick`: every vehicle moves
//! first, then vehicles within range of the RSU try to send, malicious
//! vehicles before legitimate ones. The run ends once the clock passes the
//! configured duration or the [`StopSignal`] is raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{SetupError, SetupResult};
use crate::metrics::SimEvent;
use crate::motion::Point;
use crate::rsu::{AdmissionPolicy, Rsu, Verdict};
use crate::vehicle::{Vehicle, VehicleClass, VehicleTag};

pub const DEFAULT_TICK: Duration = Duration::from_millis(10);
pub const DEFAULT_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_RANGE: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorConfig {
    pub tick: Duration,
    pub duration: Duration,
    /// Exclusive communication range around the RSU.
    pub range: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            duration: DEFAULT_DURATION,
            range: DEFAULT_RANGE,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> SetupResult<()> {
        if self.tick.is_zero() {
            return Err(SetupError::Config("tick interval must be non-zero".into()));
        }
        if self.duration.is_zero() {
            return Err(SetupError::Config("run duration must be non-zero".into()));
        }
        if !(self.range > 0.0 && self.range.is_finite()) {
            return Err(SetupError::Config(format!(
                "communication range must be positive (got {})",
                self.range
            )));
        }
        Ok(())
    }
}

/// Cooperative stop request shared with whoever drives the simulator.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSnapshot {
    pub tag: VehicleTag,
    pub position: Point,
    pub revoked: bool,
    pub communication_error: bool,
    pub in_range: bool,
}

/// Read-only view of the world after a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSnapshot {
    pub tick: u64,
    pub elapsed: Duration,
    pub rsu_position: Point,
    pub rsu_operational: bool,
    pub vehicles: Vec<VehicleSnapshot>,
}

pub struct Simulator {
    config: SimulatorConfig,
    rsu: Rsu,
    vehicles: Vec<Vehicle>,
    tick: u64,
    now: Duration,
    finished: bool,
    stop: StopSignal,
    events: Vec<SimEvent>,
}

impl Simulator {
    /// Vehicles are reordered so malicious ones come first; declaration order
    /// is kept within a class.
    pub fn new(config: SimulatorConfig, rsu: Rsu, mut vehicles: Vec<Vehicle>) -> SetupResult<Self> {
        config.validate()?;
        vehicles.sort_by_key(|vehicle| vehicle.class().rank());
        Ok(Self {
            config,
            rsu,
            vehicles,
            tick: 0,
            now: Duration::ZERO,
            finished: false,
            stop: StopSignal::new(),
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn rsu(&self) -> &Rsu {
        &self.rsu
    }

    /// Simulated time of the next tick.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Ticks executed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.finished || self.stop.is_raised()
    }

    /// True when the run ended on the stop signal rather than the clock.
    pub fn stopped_early(&self) -> bool {
        self.stop.is_raised() && self.now <= self.config.duration
    }

    /// Runs one tick. Returns false once the run is over and nothing ran.
    pub fn step(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        let now = self.now;

        for vehicle in &mut self.vehicles {
            vehicle.advance();
        }

        let rsu_position = self.rsu.position();
        for vehicle in &mut self.vehicles {
            if vehicle.distance_to(rsu_position) >= self.config.range {
                continue;
            }
            let tag = vehicle.tag();

            if self.rsu.admission().authenticates()
                && !vehicle.is_revoked()
                && vehicle.authenticate()
            {
                debug!(
                    target = "rsu::sim::simulator",
                    vehicle = %tag.id,
                    key = %tag.id.key(),
                    "vehicle authenticated"
                );
                self.events.push(SimEvent::Authenticated {
                    vehicle: tag,
                    key: tag.id.key(),
                    at: now,
                });
            }

            if vehicle.try_emit(now) {
                let verdict = self.rsu.receive(vehicle);
                push_verdict(&mut self.events, tag, verdict, now);
            }

            if vehicle.class() == VehicleClass::Legitimate
                && !self.rsu.is_operational()
                && vehicle.flag_communication_error()
            {
                info!(
                    target = "rsu::sim::simulator",
                    vehicle = %tag.id,
                    label = %tag.label(),
                    "RSU unreachable, communication error"
                );
                self.events.push(SimEvent::CommunicationError {
                    vehicle: tag,
                    at: now,
                });
            }
        }

        self.tick += 1;
        self.now = self.now.saturating_add(self.config.tick);
        if self.now > self.config.duration {
            self.finished = true;
        }
        true
    }

    pub fn snapshot(&self) -> TickSnapshot {
        let rsu_position = self.rsu.position();
        TickSnapshot {
            tick: self.tick,
            elapsed: self.now,
            rsu_position,
            rsu_operational: self.rsu.is_operational(),
            vehicles: self
                .vehicles
                .iter()
                .map(|vehicle| VehicleSnapshot {
                    tag: vehicle.tag(),
                    position: vehicle.position(),
                    revoked: vehicle.is_revoked(),
                    communication_error: vehicle.has_communication_error(),
                    in_range: vehicle.distance_to(rsu_position) < self.config.range,
                })
                .collect(),
        }
    }

    /// Runs to completion, handing every post-tick snapshot to `observer`.
    pub fn run_with<F>(&mut self, mut observer: F)
    where
        F: FnMut(&TickSnapshot),
    {
        while self.step() {
            observer(&self.snapshot());
        }
    }

    pub fn run(&mut self) {
        while self.step() {}
    }

    /// Events produced since the last call, in the order they occurred.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }
}

fn push_verdict(events: &mut Vec<SimEvent>, vehicle: VehicleTag, verdict: Verdict, at: Duration) {
    match verdict {
        Verdict::Accepted => events.push(SimEvent::Accepted { vehicle, at }),
        Verdict::AcceptedAndRevoked { accepted } => {
            events.push(SimEvent::Accepted { vehicle, at });
            events.push(SimEvent::Revoked {
                vehicle,
                accepted,
                at,
            });
        }
        Verdict::AcceptedAndExhausted { message_count } => {
            events.push(SimEvent::Accepted { vehicle, at });
            events.push(SimEvent::RsuInoperable { message_count, at });
        }
        Verdict::Dropped(reason) => events.push(SimEvent::Dropped {
            vehicle,
            reason,
            at,
        }),
    }
}
