use std::time::Duration;

use proptest::prelude::*;

use rsu_sim::motion::{Path, PathFollower, Point};
use rsu_sim::rsu::{
    AdmissionPolicy, CapacityGate, DropReason, Ledger, Sender, SenderStatus, Verdict,
};
use rsu_sim::vehicle::{SendPolicy, Vehicle, VehicleClass, VehicleId};

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(64);
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

fn class() -> impl Strategy<Value = VehicleClass> {
    prop_oneof![Just(VehicleClass::Malicious), Just(VehicleClass::Legitimate)]
}

fn senders() -> impl Strategy<Value = Vec<Sender>> {
    // Classes are fixed per identity, so draw them once and index by id.
    (prop::collection::vec(class(), 4), prop::collection::vec(0u32..4, 0..400)).prop_map(
        |(classes, ids)| {
            ids.into_iter()
                .map(|id| Sender {
                    id: VehicleId::new(id),
                    class: classes[id as usize],
                })
                .collect()
        },
    )
}

fn parked(interval: Duration) -> Vehicle {
    let spot = Point::new(0.0, 0.0);
    Vehicle::new(
        VehicleId::new(0),
        VehicleClass::Legitimate,
        1,
        spot,
        Path::new(vec![spot]),
        SendPolicy::new(interval),
        1.0,
    )
}

proptest! {
    #![proptest_config(proptest_config())]
    #[test]
    fn emissions_respect_the_interval(
        interval_ms in 1u64..200,
        tick_ms in 1u64..50,
        run_ms in 100u64..5_000,
    ) {
        let interval = Duration::from_millis(interval_ms);
        let mut vehicle = parked(interval);
        let mut previous: Option<Duration> = None;
        let mut now = Duration::ZERO;
        while now <= Duration::from_millis(run_ms) {
            if vehicle.try_emit(now) {
                if let Some(previous) = previous {
                    prop_assert!(now - previous > interval);
                }
                previous = Some(now);
            }
            now += Duration::from_millis(tick_ms);
        }
        prop_assert!(vehicle.sent() <= run_ms / interval_ms + 1);
    }
}

proptest! {
    #![proptest_config(proptest_config())]
    #[test]
    fn revocation_is_terminal_and_exact(threshold in 1u64..30, stream in senders()) {
        let mut ledger = Ledger::new(threshold);
        for sender in stream {
            let before = ledger.status(sender.id);
            let accepted_before = ledger.accepted(sender.id);
            let verdict = ledger.admit(sender);

            if before == Some(SenderStatus::Revoked) {
                prop_assert_eq!(verdict, Verdict::Dropped(DropReason::Revoked));
                prop_assert_eq!(ledger.accepted(sender.id), accepted_before);
                continue;
            }
            prop_assert!(verdict.is_accepted());
            prop_assert_eq!(ledger.accepted(sender.id), accepted_before + 1);
            match verdict {
                Verdict::AcceptedAndRevoked { accepted } => {
                    prop_assert!(sender.class.is_malicious());
                    prop_assert_eq!(accepted, threshold + 1);
                }
                _ => {
                    prop_assert!(
                        ledger.accepted(sender.id) <= threshold || !sender.class.is_malicious()
                    );
                }
            }
            if !sender.class.is_malicious() {
                prop_assert_eq!(ledger.status(sender.id), Some(SenderStatus::Active));
            }
        }
    }
}

proptest! {
    #![proptest_config(proptest_config())]
    #[test]
    fn capacity_gate_fails_exactly_once(capacity in 1u64..100, stream in senders()) {
        let mut gate = CapacityGate::new(capacity);
        let mut exhausted = 0;
        for (idx, sender) in stream.iter().enumerate() {
            let was_operational = gate.is_operational();
            let verdict = gate.admit(*sender);
            if !was_operational {
                prop_assert_eq!(verdict, Verdict::Dropped(DropReason::Inoperable));
                prop_assert_eq!(gate.message_count(), capacity + 1);
                continue;
            }
            if let Verdict::AcceptedAndExhausted { message_count } = verdict {
                exhausted += 1;
                prop_assert_eq!(message_count, capacity + 1);
                prop_assert_eq!(idx as u64, capacity);
            }
        }
        prop_assert_eq!(exhausted, usize::from(stream.len() as u64 > capacity));
        prop_assert_eq!(gate.is_operational(), stream.len() as u64 <= capacity);
    }
}

proptest! {
    #![proptest_config(proptest_config())]
    #[test]
    fn follower_keeps_a_valid_target(
        waypoints in prop::collection::vec((0.0f64..800.0, 0.0f64..600.0), 1..6),
        step in 0.5f64..20.0,
        ticks in 0usize..2_000,
    ) {
        let points: Vec<Point> = waypoints.iter().map(|&(x, y)| Point::new(x, y)).collect();
        let len = points.len();
        let mut follower = PathFollower::new(Path::new(points), step);
        let mut position = Point::new(400.0, 300.0);
        for _ in 0..ticks {
            let before = position;
            follower.advance(&mut position);
            prop_assert!(follower.target_index() < len);
            prop_assert!(before.distance_to(position) <= step + 1e-9);
        }
    }
}
