use std::fmt::Write;

use crate::metrics::{ClassTotals, SimulationSummary};
use crate::vehicle::VehicleClass;

/// End-of-run report: per-class totals, then one line per vehicle.
pub fn render_compact(summary: &SimulationSummary) -> String {
    let mut out = String::new();

    writeln!(&mut out, "Simulation ended ({}).", summary.variant).unwrap();
    writeln!(
        &mut out,
        "Ticks: {} | Simulated: {:.0} ms{}",
        summary.ticks,
        summary.simulated_ms,
        if summary.stopped_early {
            " | stopped early"
        } else {
            ""
        }
    )
    .unwrap();

    if summary.malicious.vehicles > 0 {
        writeln!(&mut out).unwrap();
        render_class(&mut out, summary, VehicleClass::Malicious, &summary.malicious);
    }
    writeln!(&mut out).unwrap();
    render_class(&mut out, summary, VehicleClass::Legitimate, &summary.legitimate);

    writeln!(&mut out).unwrap();
    let rsu = &summary.rsu;
    writeln!(
        &mut out,
        "RSU ({}): {}",
        rsu.policy,
        if rsu.operational {
            "operational"
        } else {
            "inoperable"
        }
    )
    .unwrap();
    if let (Some(count), Some(capacity)) = (rsu.message_count, rsu.capacity) {
        writeln!(&mut out, "  messages : {count} / {capacity}").unwrap();
    }
    if let Some(at) = rsu.inoperable_at_ms {
        writeln!(&mut out, "  inoperable since {at:.0} ms").unwrap();
    }
    if !summary.revocations.is_empty() {
        writeln!(&mut out, "  revoked keys:").unwrap();
        for revocation in &summary.revocations {
            writeln!(
                &mut out,
                "    {} ({}) after {} messages at {:.0} ms",
                revocation.key, revocation.vehicle, revocation.accepted, revocation.timestamp_ms
            )
            .unwrap();
        }
    }
    if summary.legitimate.communication_errors > 0 {
        writeln!(
            &mut out,
            "  legitimate vehicles cut off: {}",
            summary.legitimate.communication_errors
        )
        .unwrap();
    }

    if let Some(usage) = &summary.resource_usage {
        writeln!(
            &mut out,
            "\nCPU {:.2} s over {:.2} s wall ({:.1}%), max RSS {} KiB",
            usage.cpu_time_secs,
            usage.wall_time_secs,
            usage.avg_cpu_percent,
            usage.max_rss_bytes / 1024
        )
        .unwrap();
    }

    out
}

fn render_class(
    out: &mut String,
    summary: &SimulationSummary,
    class: VehicleClass,
    totals: &ClassTotals,
) {
    let title = class.title();
    writeln!(out, "{title} vehicles sent packets: {}", totals.sent).unwrap();
    writeln!(out, "{title} vehicles received packets: {}", totals.received).unwrap();
    writeln!(out, "-- Detailed {title} Vehicle Data --").unwrap();
    for vehicle in summary.vehicles_of(class) {
        write!(
            out,
            "{}: Sent {}, Received {}",
            vehicle.label, vehicle.sent, vehicle.received
        )
        .unwrap();
        if vehicle.revoked {
            write!(out, " (revoked)").unwrap();
        }
        if vehicle.communication_error {
            write!(out, " (communication error)").unwrap();
        }
        writeln!(out).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{EventTotals, RevocationRecord, RsuRecord, VehicleRecord};
    use crate::motion::Point;

    fn record(class: VehicleClass, ordinal: usize, sent: u64, received: u64) -> VehicleRecord {
        VehicleRecord {
            label: format!("{} Vehicle {ordinal}", class.title()),
            key: format!("Key{ordinal}"),
            class,
            ordinal,
            sent,
            received,
            dropped: sent - received,
            revoked: class.is_malicious(),
            communication_error: false,
            authenticated: true,
            final_position: Point::default(),
        }
    }

    fn summary(vehicles: Vec<VehicleRecord>) -> SimulationSummary {
        SimulationSummary {
            variant: "ledger".into(),
            ticks: 1_001,
            simulated_ms: 10_010.0,
            stopped_early: false,
            malicious: ClassTotals::from_records(&vehicles, VehicleClass::Malicious),
            legitimate: ClassTotals::from_records(&vehicles, VehicleClass::Legitimate),
            vehicles,
            rsu: RsuRecord {
                policy: "ledger".into(),
                operational: true,
                ..RsuRecord::default()
            },
            revocations: vec![RevocationRecord {
                vehicle: "Malicious Vehicle 1".into(),
                key: "Key1".into(),
                accepted: 51,
                timestamp_ms: 510.0,
            }],
            events: EventTotals::default(),
            resource_usage: None,
        }
    }

    #[test]
    fn renders_both_classes() {
        let out = render_compact(&summary(vec![
            record(VehicleClass::Malicious, 1, 1_000, 51),
            record(VehicleClass::Legitimate, 1, 166, 166),
        ]));
        assert!(out.contains("Malicious vehicles sent packets: 1000"));
        assert!(out.contains("-- Detailed Malicious Vehicle Data --"));
        assert!(out.contains("Malicious Vehicle 1: Sent 1000, Received 51 (revoked)"));
        assert!(out.contains("Legitimate Vehicle 1: Sent 166, Received 166\n"));
        assert!(out.contains("RSU (ledger): operational"));
        assert!(out.contains("Key1 (Malicious Vehicle 1) after 51 messages at 510 ms"));
    }

    #[test]
    fn skips_malicious_section_without_attackers() {
        let out = render_compact(&summary(vec![record(VehicleClass::Legitimate, 1, 10, 10)]));
        assert!(!out.contains("Malicious vehicles"));
        assert!(out.contains("Legitimate vehicles received packets: 10"));
    }
}
