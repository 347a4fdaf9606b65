use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduling::availability::CandidateSlot;

/// Default number of slots offered to a prospect in one choice list.
pub const SNAPSHOT_CAP: usize = 5;

/// The slots that were actually offered to a lead, frozen so a later reply
/// ("2") resolves against the same numbering without re-querying the
/// calendar. Lives in the per-lead scheduling-context store, never inside
/// the conversation transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub slots: Vec<CandidateSlot>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SlotSnapshot {
    pub fn capture(
        mut slots: Vec<CandidateSlot>,
        cap: usize,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        slots.truncate(cap);
        Self { slots, created_at, expires_at: created_at + ttl }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Resolves a 1-based ordinal as offered in the choice list.
    pub fn slot(&self, ordinal: u8) -> Option<&CandidateSlot> {
        if ordinal == 0 {
            return None;
        }
        self.slots.get(usize::from(ordinal) - 1)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
