use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::motion::{Path, PathFollower, Point};

/// Default emission interval of a flooding vehicle.
pub const DEFAULT_MALICIOUS_INTERVAL: Duration = Duration::from_micros(100);
/// Default emission interval of a well-behaved vehicle.
pub const DEFAULT_LEGITIMATE_INTERVAL: Duration = Duration::from_millis(50);

/// Stable vehicle identity, also used as the ledger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(u32);

impl VehicleId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Opaque key presented to the RSU when authenticating.
    pub fn key(self) -> String {
        format!("Key{}", self.0)
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Hands out identities in creation order. Identities are never reused.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> VehicleId {
        let id = VehicleId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Malicious,
    Legitimate,
}

impl VehicleClass {
    pub fn as_str(self) -> &'static str {
        match self {
            VehicleClass::Malicious => "malicious",
            VehicleClass::Legitimate => "legitimate",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            VehicleClass::Malicious => "Malicious",
            VehicleClass::Legitimate => "Legitimate",
        }
    }

    /// Processing rank within a tick: malicious senders go first.
    pub(crate) fn rank(self) -> u8 {
        match self {
            VehicleClass::Malicious => 0,
            VehicleClass::Legitimate => 1,
        }
    }

    pub fn is_malicious(self) -> bool {
        matches!(self, VehicleClass::Malicious)
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact, copyable reference to a vehicle for events and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleTag {
    pub id: VehicleId,
    pub class: VehicleClass,
    pub ordinal: usize,
}

impl VehicleTag {
    pub fn label(&self) -> String {
        format!("{} Vehicle {}", self.class.title(), self.ordinal)
    }
}

/// Token-less rate limiter: at most one emission per `interval`, no bursts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendPolicy {
    interval: Duration,
}

impl SendPolicy {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn for_class(class: VehicleClass) -> Self {
        match class {
            VehicleClass::Malicious => Self::new(DEFAULT_MALICIOUS_INTERVAL),
            VehicleClass::Legitimate => Self::new(DEFAULT_LEGITIMATE_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True when strictly more than one interval has elapsed since the last
    /// emission.
    pub fn ready(&self, now: Duration, last_sent_at: Duration) -> bool {
        now.saturating_sub(last_sent_at) > self.interval
    }
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    id: VehicleId,
    class: VehicleClass,
    ordinal: usize,
    position: Point,
    follower: PathFollower,
    policy: SendPolicy,
    last_sent_at: Duration,
    sent: u64,
    received: u64,
    dropped: u64,
    revoked: bool,
    communication_error: bool,
    authenticated: bool,
}

impl Vehicle {
    /// Creates a vehicle at `start` heading for the first waypoint of `path`.
    ///
    /// `ordinal` is the 1-based position of the vehicle within its class and
    /// only feeds human-readable labels.
    pub fn new(
        id: VehicleId,
        class: VehicleClass,
        ordinal: usize,
        start: Point,
        path: Path,
        policy: SendPolicy,
        step: f64,
    ) -> Self {
        Self {
            id,
            class,
            ordinal,
            position: start,
            follower: PathFollower::new(path, step),
            policy,
            last_sent_at: Duration::ZERO,
            sent: 0,
            received: 0,
            dropped: 0,
            revoked: false,
            communication_error: false,
            authenticated: false,
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn class(&self) -> VehicleClass {
        self.class
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn tag(&self) -> VehicleTag {
        VehicleTag {
            id: self.id,
            class: self.class,
            ordinal: self.ordinal,
        }
    }

    pub fn label(&self) -> String {
        self.tag().label()
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn follower(&self) -> &PathFollower {
        &self.follower
    }

    pub fn policy(&self) -> SendPolicy {
        self.policy
    }

    pub fn last_sent_at(&self) -> Duration {
        self.last_sent_at
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn has_communication_error(&self) -> bool {
        self.communication_error
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn distance_to(&self, point: Point) -> f64 {
        self.position.distance_to(point)
    }

    pub fn advance(&mut self) {
        self.follower.advance(&mut self.position);
    }

    /// Applies the send policy at `now`. On success the emission is counted
    /// and the caller must hand the message to the RSU; refused sends are
    /// never retried.
    pub fn try_emit(&mut self, now: Duration) -> bool {
        if !self.policy.ready(now, self.last_sent_at) {
            return false;
        }
        self.last_sent_at = now;
        self.sent += 1;
        true
    }

    /// Marks the vehicle authenticated. Returns true only the first time.
    pub(crate) fn authenticate(&mut self) -> bool {
        !std::mem::replace(&mut self.authenticated, true)
    }

    pub(crate) fn record_received(&mut self) {
        self.received += 1;
    }

    pub(crate) fn record_dropped(&mut self) {
        self.dropped += 1;
    }

    /// Sets the revoked bit. Returns true only on the first call.
    pub(crate) fn revoke(&mut self) -> bool {
        !std::mem::replace(&mut self.revoked, true)
    }

    /// Sets the communication-error bit. Returns true only on the first call.
    pub(crate) fn flag_communication_error(&mut self) -> bool {
        !std::mem::replace(&mut self.communication_error, true)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn parked(id: u32, class: VehicleClass, interval: Duration) -> Vehicle {
        let spot = Point::new(0.0, 0.0);
        Vehicle::new(
            VehicleId::new(id),
            class,
            id as usize + 1,
            spot,
            Path::new(vec![spot]),
            SendPolicy::new(interval),
            1.0,
        )
    }

    #[test]
    fn first_emission_waits_a_full_interval() {
        let mut vehicle = parked(0, VehicleClass::Legitimate, Duration::from_millis(50));
        assert!(!vehicle.try_emit(Duration::ZERO));
        assert!(!vehicle.try_emit(Duration::from_millis(50)));
        assert!(vehicle.try_emit(Duration::from_millis(51)));
        assert_eq!(vehicle.sent(), 1);
        assert_eq!(vehicle.last_sent_at(), Duration::from_millis(51));
    }

    #[test]
    fn emissions_never_burst() {
        let mut vehicle = parked(0, VehicleClass::Legitimate, Duration::from_millis(50));
        assert!(vehicle.try_emit(Duration::from_secs(5)));
        assert!(!vehicle.try_emit(Duration::from_secs(5)));
        assert!(!vehicle.try_emit(Duration::from_millis(5_050)));
        assert!(vehicle.try_emit(Duration::from_millis(5_060)));
        assert_eq!(vehicle.sent(), 2);
    }

    #[test]
    fn flood_interval_emits_every_tick() {
        let mut vehicle = parked(0, VehicleClass::Malicious, DEFAULT_MALICIOUS_INTERVAL);
        let emitted = (1..=100)
            .filter(|tick| vehicle.try_emit(Duration::from_millis(10 * tick)))
            .count();
        assert_eq!(emitted, 100);
    }

    #[test]
    fn class_defaults_differ_by_five_hundred() {
        let malicious = SendPolicy::for_class(VehicleClass::Malicious).interval();
        let legitimate = SendPolicy::for_class(VehicleClass::Legitimate).interval();
        assert_eq!(legitimate.as_nanos() / malicious.as_nanos(), 500);
    }

    #[test]
    fn one_shot_flags() {
        let mut vehicle = parked(3, VehicleClass::Malicious, DEFAULT_MALICIOUS_INTERVAL);
        assert!(vehicle.revoke());
        assert!(!vehicle.revoke());
        assert!(vehicle.is_revoked());
        assert!(vehicle.authenticate());
        assert!(!vehicle.authenticate());
        assert!(vehicle.flag_communication_error());
        assert!(!vehicle.flag_communication_error());
        assert_eq!(vehicle.label(), "Malicious Vehicle 4");
        assert_eq!(vehicle.id().key(), "Key3");
    }

    #[test]
    fn allocator_is_monotonic() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        assert!(a < b);
        assert_eq!(b.get(), a.get() + 1);
    }
}
