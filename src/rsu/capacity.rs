use super::{AdmissionPolicy, DropReason, Sender, Verdict};

/// Messages the RSU processes before it is overwhelmed.
pub const DEFAULT_CAPACITY: u64 = 2_500;

/// Global message budget that models resource exhaustion.
///
/// The gate is shared by every sender. Once the counter exceeds the capacity
/// the gate stays closed for the rest of the run; only an explicit
/// [`CapacityGate::reset`] reopens it.
#[derive(Debug, Clone)]
pub struct CapacityGate {
    capacity: u64,
    message_count: u64,
    operational: bool,
}

impl CapacityGate {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            message_count: 0,
            operational: true,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    pub fn reset(&mut self) {
        self.message_count = 0;
        self.operational = true;
    }
}

impl Default for CapacityGate {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl AdmissionPolicy for CapacityGate {
    fn admit(&mut self, _sender: Sender) -> Verdict {
        if !self.operational {
            return Verdict::Dropped(DropReason::Inoperable);
        }
        self.message_count += 1;
        if self.message_count > self.capacity {
            self.operational = false;
            return Verdict::AcceptedAndExhausted {
                message_count: self.message_count,
            };
        }
        Verdict::Accepted
    }

    fn is_operational(&self) -> bool {
        self.operational
    }
}
