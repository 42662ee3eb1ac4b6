use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::metrics::reduce::{
    ClassTotals, EventTotals, ResourceUsageMetrics, RevocationRecord, RsuRecord,
    SimulationSummary, VehicleRecord,
};
use crate::rsu::DropReason;
use crate::vehicle::{VehicleClass, VehicleTag};

/// Everything the simulator reports while a run is in progress.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Authenticated {
        vehicle: VehicleTag,
        key: String,
        at: Duration,
    },
    Accepted {
        vehicle: VehicleTag,
        at: Duration,
    },
    Dropped {
        vehicle: VehicleTag,
        reason: DropReason,
        at: Duration,
    },
    Revoked {
        vehicle: VehicleTag,
        accepted: u64,
        at: Duration,
    },
    RsuInoperable {
        message_count: u64,
        at: Duration,
    },
    CommunicationError {
        vehicle: VehicleTag,
        at: Duration,
    },
}

impl SimEvent {
    pub fn at(&self) -> Duration {
        match self {
            SimEvent::Authenticated { at, .. }
            | SimEvent::Accepted { at, .. }
            | SimEvent::Dropped { at, .. }
            | SimEvent::Revoked { at, .. }
            | SimEvent::RsuInoperable { at, .. }
            | SimEvent::CommunicationError { at, .. } => *at,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SimEvent::Authenticated { .. } => "authenticated",
            SimEvent::Accepted { .. } => "accepted",
            SimEvent::Dropped { .. } => "dropped",
            SimEvent::Revoked { .. } => "revoked",
            SimEvent::RsuInoperable { .. } => "rsu_inoperable",
            SimEvent::CommunicationError { .. } => "communication_error",
        }
    }
}

/// One line of the exported event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<VehicleClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp_ms: f64,
}

/// Final state of the run as read from the simulator.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub variant: String,
    pub ticks: u64,
    pub elapsed: Duration,
    pub stopped_early: bool,
    pub vehicles: Vec<VehicleRecord>,
    pub rsu: RsuRecord,
}

pub struct Collector {
    record_log: bool,
    totals: EventTotals,
    revocations: Vec<RevocationRecord>,
    inoperable_at: Option<Duration>,
    log: Vec<EventRecord>,
    resource_usage: Option<ResourceUsageMetrics>,
}

impl Collector {
    /// `record_log` keeps a per-event record for export; counters are always
    /// maintained.
    pub fn new(record_log: bool) -> Self {
        Self {
            record_log,
            totals: EventTotals::default(),
            revocations: Vec::new(),
            inoperable_at: None,
            log: Vec::new(),
            resource_usage: None,
        }
    }

    pub fn ingest(&mut self, event: SimEvent) {
        match &event {
            SimEvent::Authenticated { vehicle, .. } => {
                self.totals.authentications += 1;
                tracing::trace!(target = "rsu::sim::metrics", vehicle = %vehicle.id, "authentication recorded");
            }
            SimEvent::Accepted { .. } => {
                self.totals.accepted += 1;
            }
            SimEvent::Dropped { reason, .. } => match reason {
                DropReason::Revoked => self.totals.dropped_revoked += 1,
                DropReason::Inoperable => self.totals.dropped_inoperable += 1,
            },
            SimEvent::Revoked {
                vehicle,
                accepted,
                at,
            } => {
                self.totals.revocations += 1;
                self.revocations.push(RevocationRecord {
                    vehicle: vehicle.label(),
                    key: vehicle.id.key(),
                    accepted: *accepted,
                    timestamp_ms: millis(*at),
                });
            }
            SimEvent::RsuInoperable { at, .. } => {
                self.inoperable_at.get_or_insert(*at);
            }
            SimEvent::CommunicationError { vehicle, .. } => {
                self.totals.communication_errors += 1;
                tracing::trace!(target = "rsu::sim::metrics", vehicle = %vehicle.id, "communication error recorded");
            }
        }
        if self.record_log {
            self.log.push(event_record(&event));
        }
    }

    pub fn record_resource_usage(&mut self, usage: ResourceUsageMetrics) {
        self.resource_usage = Some(usage);
    }

    /// Exported event log, empty unless the collector was created with
    /// `record_log`.
    pub fn event_log(&self) -> &[EventRecord] {
        &self.log
    }

    pub fn finalize(&self, outcome: RunOutcome) -> SimulationSummary {
        let malicious = ClassTotals::from_records(&outcome.vehicles, VehicleClass::Malicious);
        let legitimate = ClassTotals::from_records(&outcome.vehicles, VehicleClass::Legitimate);
        let mut rsu = outcome.rsu;
        rsu.inoperable_at_ms = self.inoperable_at.map(millis);

        SimulationSummary {
            variant: outcome.variant,
            ticks: outcome.ticks,
            simulated_ms: millis(outcome.elapsed),
            stopped_early: outcome.stopped_early,
            malicious,
            legitimate,
            vehicles: outcome.vehicles,
            rsu,
            revocations: self.revocations.clone(),
            events: self.totals.clone(),
            resource_usage: self.resource_usage.clone(),
        }
    }
}

fn millis(at: Duration) -> f64 {
    at.as_secs_f64() * 1_000.0
}

fn event_record(event: &SimEvent) -> EventRecord {
    let timestamp_ms = millis(event.at());
    let kind = event.kind().to_string();
    let (vehicle, detail) = match event {
        SimEvent::Authenticated { vehicle, key, .. } => (Some(*vehicle), Some(key.clone())),
        SimEvent::Accepted { vehicle, .. } => (Some(*vehicle), None),
        SimEvent::Dropped {
            vehicle, reason, ..
        } => (Some(*vehicle), Some(reason.as_str().to_string())),
        SimEvent::Revoked {
            vehicle, accepted, ..
        } => (Some(*vehicle), Some(format!("accepted:{accepted}"))),
        SimEvent::RsuInoperable { message_count, .. } => {
            (None, Some(format!("messages:{message_count}")))
        }
        SimEvent::CommunicationError { vehicle, .. } => (Some(*vehicle), None),
    };
    EventRecord {
        kind,
        vehicle: vehicle.map(|tag| tag.label()),
        class: vehicle.map(|tag| tag.class),
        detail,
        timestamp_ms,
    }
}
