use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{AdmissionPolicy, DropReason, Sender, Verdict};
use crate::vehicle::VehicleId;

/// Accepted messages a malicious sender may deliver before revocation.
pub const DEFAULT_MISBEHAVIOR_THRESHOLD: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderStatus {
    Active,
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub status: SenderStatus,
    pub accepted: u64,
}

impl LedgerEntry {
    pub fn is_revoked(&self) -> bool {
        self.status == SenderStatus::Revoked
    }
}

/// Per-sender status table with a misbehavior threshold.
///
/// Status only moves from `Active` to `Revoked`. Counters never decay, so any
/// malicious sender that keeps delivering will eventually trip the threshold.
/// Only senders already classified malicious are evaluated; legitimate
/// senders can accumulate any number of messages.
#[derive(Debug, Clone)]
pub struct Ledger {
    threshold: u64,
    entries: BTreeMap<VehicleId, LedgerEntry>,
}

impl Ledger {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            entries: BTreeMap::new(),
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn status(&self, id: VehicleId) -> Option<SenderStatus> {
        self.entries.get(&id).map(|entry| entry.status)
    }

    pub fn accepted(&self, id: VehicleId) -> u64 {
        self.entries.get(&id).map(|entry| entry.accepted).unwrap_or(0)
    }

    pub fn entries(&self) -> impl Iterator<Item = (VehicleId, &LedgerEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    pub fn revoked_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.status == SenderStatus::Revoked)
            .count()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_MISBEHAVIOR_THRESHOLD)
    }
}

impl AdmissionPolicy for Ledger {
    fn admit(&mut self, sender: Sender) -> Verdict {
        let entry = self.entries.entry(sender.id).or_insert(LedgerEntry {
            status: SenderStatus::Active,
            accepted: 0,
        });
        if entry.status == SenderStatus::Revoked {
            return Verdict::Dropped(DropReason::Revoked);
        }
        entry.accepted += 1;
        if sender.class.is_malicious() && entry.accepted > self.threshold {
            entry.status = SenderStatus::Revoked;
            return Verdict::AcceptedAndRevoked {
                accepted: entry.accepted,
            };
        }
        Verdict::Accepted
    }

    fn is_revoked(&self, id: VehicleId) -> bool {
        self.status(id) == Some(SenderStatus::Revoked)
    }

    fn authenticates(&self) -> bool {
        true
    }
}
