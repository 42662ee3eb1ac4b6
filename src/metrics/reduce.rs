use serde::{Deserialize, Serialize};

use crate::motion::Point;
use crate::rsu::{Admission, Rsu};
use crate::vehicle::{Vehicle, VehicleClass};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClassTotals {
    pub vehicles: usize,
    pub sent: u64,
    pub received: u64,
    pub dropped: u64,
    pub revoked: usize,
    pub communication_errors: usize,
}

impl ClassTotals {
    pub fn from_records(records: &[VehicleRecord], class: VehicleClass) -> Self {
        records
            .iter()
            .filter(|record| record.class == class)
            .fold(Self::default(), |mut totals, record| {
                totals.vehicles += 1;
                totals.sent += record.sent;
                totals.received += record.received;
                totals.dropped += record.dropped;
                totals.revoked += usize::from(record.revoked);
                totals.communication_errors += usize::from(record.communication_error);
                totals
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleRecord {
    pub label: String,
    pub key: String,
    pub class: VehicleClass,
    pub ordinal: usize,
    pub sent: u64,
    pub received: u64,
    pub dropped: u64,
    pub revoked: bool,
    pub communication_error: bool,
    #[serde(default)]
    pub authenticated: bool,
    pub final_position: Point,
}

impl From<&Vehicle> for VehicleRecord {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            label: vehicle.label(),
            key: vehicle.id().key(),
            class: vehicle.class(),
            ordinal: vehicle.ordinal(),
            sent: vehicle.sent(),
            received: vehicle.received(),
            dropped: vehicle.dropped(),
            revoked: vehicle.is_revoked(),
            communication_error: vehicle.has_communication_error(),
            authenticated: vehicle.is_authenticated(),
            final_position: vehicle.position(),
        }
    }
}

/// Final RSU state. Policy-specific fields are absent for the other policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RsuRecord {
    pub policy: String,
    pub position: Point,
    pub operational: bool,
    pub accepted_malicious: u64,
    pub accepted_legitimate: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub misbehavior_threshold: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revoked_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inoperable_at_ms: Option<f64>,
}

impl From<&Rsu> for RsuRecord {
    fn from(rsu: &Rsu) -> Self {
        let per_class = rsu.per_class();
        let mut record = Self {
            policy: rsu.admission().name().to_string(),
            position: rsu.position(),
            operational: rsu.is_operational(),
            accepted_malicious: per_class.malicious,
            accepted_legitimate: per_class.legitimate,
            ..Self::default()
        };
        match rsu.admission() {
            Admission::Ledger(ledger) => {
                record.misbehavior_threshold = Some(ledger.threshold());
                record.revoked_keys = ledger
                    .entries()
                    .filter(|(_, entry)| entry.is_revoked())
                    .map(|(id, _)| id.key())
                    .collect();
            }
            Admission::Capacity(gate) => {
                record.capacity = Some(gate.capacity());
                record.message_count = Some(gate.message_count());
            }
        }
        record
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevocationRecord {
    pub vehicle: String,
    pub key: String,
    pub accepted: u64,
    pub timestamp_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EventTotals {
    pub authentications: u64,
    pub accepted: u64,
    pub dropped_revoked: u64,
    pub dropped_inoperable: u64,
    pub revocations: u64,
    pub communication_errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResourceUsageMetrics {
    /// Sum of user and system CPU time in seconds.
    pub cpu_time_secs: f64,
    /// Wall-clock time spanned by the run in seconds.
    pub wall_time_secs: f64,
    /// Average CPU consumption expressed as a percentage of a single core.
    pub avg_cpu_percent: f64,
    pub max_rss_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationSummary {
    pub variant: String,
    pub ticks: u64,
    pub simulated_ms: f64,
    #[serde(default)]
    pub stopped_early: bool,
    pub malicious: ClassTotals,
    pub legitimate: ClassTotals,
    pub vehicles: Vec<VehicleRecord>,
    pub rsu: RsuRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revocations: Vec<RevocationRecord>,
    pub events: EventTotals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_usage: Option<ResourceUsageMetrics>,
}

impl SimulationSummary {
    pub fn total_sent(&self) -> u64 {
        self.malicious.sent + self.legitimate.sent
    }

    pub fn total_received(&self) -> u64 {
        self.malicious.received + self.legitimate.received
    }

    pub fn total_dropped(&self) -> u64 {
        self.malicious.dropped + self.legitimate.dropped
    }

    pub fn vehicles_of(&self, class: VehicleClass) -> impl Iterator<Item = &VehicleRecord> {
        self.vehicles
            .iter()
            .filter(move |record| record.class == class)
    }

    /// Same summary without the host-dependent resource figures, for
    /// comparing two runs.
    pub fn without_resource_usage(&self) -> Self {
        Self {
            resource_usage: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::rsu::{CapacityGate, Ledger, DEFAULT_RSU_POSITION};
    use crate::vehicle::tests::parked;

    #[test]
    fn class_totals_only_count_their_class() {
        let mut attacker = parked(0, VehicleClass::Malicious, Duration::from_micros(100));
        let honest = parked(1, VehicleClass::Legitimate, Duration::from_millis(50));
        attacker.try_emit(Duration::from_millis(10));
        attacker.revoke();
        let records = vec![
            VehicleRecord::from(&attacker),
            VehicleRecord::from(&honest),
        ];
        let malicious = ClassTotals::from_records(&records, VehicleClass::Malicious);
        assert_eq!(malicious.vehicles, 1);
        assert_eq!(malicious.sent, 1);
        assert_eq!(malicious.revoked, 1);
        let legitimate = ClassTotals::from_records(&records, VehicleClass::Legitimate);
        assert_eq!(legitimate.vehicles, 1);
        assert_eq!(legitimate.sent, 0);
        assert_eq!(records[1].label, "Legitimate Vehicle 2");
    }

    #[test]
    fn rsu_record_lists_revoked_keys() {
        let mut rsu = Rsu::new(DEFAULT_RSU_POSITION, Admission::Ledger(Ledger::new(1)));
        let mut attacker = parked(4, VehicleClass::Malicious, Duration::from_micros(100));
        rsu.receive(&mut attacker);
        rsu.receive(&mut attacker);
        let record = RsuRecord::from(&rsu);
        assert_eq!(record.policy, "ledger");
        assert_eq!(record.revoked_keys, vec!["Key4".to_string()]);
        assert_eq!(record.misbehavior_threshold, Some(1));
        assert_eq!(record.capacity, None);
        assert_eq!(record.accepted_malicious, 2);
    }

    #[test]
    fn rsu_record_reports_capacity_state() {
        let rsu = Rsu::new(
            DEFAULT_RSU_POSITION,
            Admission::Capacity(CapacityGate::new(10)),
        );
        let record = RsuRecord::from(&rsu);
        assert_eq!(record.policy, "capacity");
        assert_eq!(record.capacity, Some(10));
        assert_eq!(record.message_count, Some(0));
        assert!(record.operational);
        assert!(record.revoked_keys.is_empty());
    }
}
