//! Roadside unit and its admission policies.
//!
//! The RSU owns exactly one [`Admission`] policy for a run:
//!
//! - [`Ledger`]: per-sender revocation of malicious identities.
//! - [`CapacityGate`]: a global budget after which the unit goes dark.
//!
//! Per-class counters are kept for reporting and never influence a verdict.

pub mod capacity;
pub mod ledger;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::motion::Point;
use crate::vehicle::{Vehicle, VehicleClass, VehicleId};

pub use capacity::{CapacityGate, DEFAULT_CAPACITY};
pub use ledger::{Ledger, LedgerEntry, SenderStatus, DEFAULT_MISBEHAVIOR_THRESHOLD};

/// Default RSU position on the scaled map.
pub const DEFAULT_RSU_POSITION: Point = Point::new(400.0, 250.0);

/// Sender attributes visible to an admission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sender {
    pub id: VehicleId,
    pub class: VehicleClass,
}

impl From<&Vehicle> for Sender {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id(),
            class: vehicle.class(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Revoked,
    Inoperable,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::Revoked => "revoked",
            DropReason::Inoperable => "inoperable",
        }
    }
}

/// Outcome of handing one message to a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Accepted, and the sender crossed the misbehavior threshold with it.
    AcceptedAndRevoked { accepted: u64 },
    /// Accepted, and the global budget ran out with it.
    AcceptedAndExhausted { message_count: u64 },
    Dropped(DropReason),
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Verdict::Dropped(_))
    }
}

pub trait AdmissionPolicy {
    fn admit(&mut self, sender: Sender) -> Verdict;

    fn is_operational(&self) -> bool {
        true
    }

    fn is_revoked(&self, _id: VehicleId) -> bool {
        false
    }

    /// Whether senders present their key before the first message.
    fn authenticates(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub enum Admission {
    Ledger(Ledger),
    Capacity(CapacityGate),
}

impl Admission {
    pub fn name(&self) -> &'static str {
        match self {
            Admission::Ledger(_) => "ledger",
            Admission::Capacity(_) => "capacity",
        }
    }

    pub fn ledger(&self) -> Option<&Ledger> {
        match self {
            Admission::Ledger(ledger) => Some(ledger),
            Admission::Capacity(_) => None,
        }
    }

    pub fn capacity_gate(&self) -> Option<&CapacityGate> {
        match self {
            Admission::Capacity(gate) => Some(gate),
            Admission::Ledger(_) => None,
        }
    }
}

impl AdmissionPolicy for Admission {
    fn admit(&mut self, sender: Sender) -> Verdict {
        match self {
            Admission::Ledger(policy) => policy.admit(sender),
            Admission::Capacity(policy) => policy.admit(sender),
        }
    }

    fn is_operational(&self) -> bool {
        match self {
            Admission::Ledger(policy) => policy.is_operational(),
            Admission::Capacity(policy) => policy.is_operational(),
        }
    }

    fn is_revoked(&self, id: VehicleId) -> bool {
        match self {
            Admission::Ledger(policy) => policy.is_revoked(id),
            Admission::Capacity(policy) => policy.is_revoked(id),
        }
    }

    fn authenticates(&self) -> bool {
        match self {
            Admission::Ledger(policy) => policy.authenticates(),
            Admission::Capacity(policy) => policy.authenticates(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounters {
    pub malicious: u64,
    pub legitimate: u64,
}

impl ClassCounters {
    fn record(&mut self, class: VehicleClass) {
        match class {
            VehicleClass::Malicious => self.malicious += 1,
            VehicleClass::Legitimate => self.legitimate += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.malicious + self.legitimate
    }
}

#[derive(Debug, Clone)]
pub struct Rsu {
    position: Point,
    admission: Admission,
    per_class: ClassCounters,
}

impl Rsu {
    pub fn new(position: Point, admission: Admission) -> Self {
        Self {
            position,
            admission,
            per_class: ClassCounters::default(),
        }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    pub fn per_class(&self) -> ClassCounters {
        self.per_class
    }

    pub fn is_operational(&self) -> bool {
        self.admission.is_operational()
    }

    /// Restores a capacity gate to its initial state. No effect on a ledger.
    pub fn reset(&mut self) {
        if let Admission::Capacity(gate) = &mut self.admission {
            gate.reset();
            info!(target = "rsu::sim::rsu", "capacity gate reset");
        }
    }

    /// Processes one message from `vehicle` and applies the verdict to the
    /// vehicle's counters and flags.
    pub fn receive(&mut self, vehicle: &mut Vehicle) -> Verdict {
        let verdict = self.admission.admit(Sender::from(&*vehicle));
        match verdict {
            Verdict::Dropped(reason) => {
                vehicle.record_dropped();
                debug!(
                    target = "rsu::sim::rsu",
                    vehicle = %vehicle.id(),
                    reason = reason.as_str(),
                    "message dropped"
                );
                return verdict;
            }
            Verdict::Accepted => {}
            Verdict::AcceptedAndRevoked { accepted } => {
                vehicle.revoke();
                warn!(
                    target = "rsu::sim::rsu",
                    vehicle = %vehicle.id(),
                    label = %vehicle.label(),
                    accepted,
                    "flood detected, key revoked"
                );
            }
            Verdict::AcceptedAndExhausted { message_count } => {
                warn!(
                    target = "rsu::sim::rsu",
                    message_count, "capacity exhausted, RSU inoperable"
                );
            }
        }
        vehicle.record_received();
        self.per_class.record(vehicle.class());
        verdict
    }
}
