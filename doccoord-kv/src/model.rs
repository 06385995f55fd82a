//! Per-document data model (spec §3, "Version Ledger"). C2 is not an active
//! component — it is this module's types plus the invariants enforced by
//! [`crate::store`].

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

pub type Version = u64;

/// An opaque, already-transformed OT operation, as committed into a slot.
/// `camelCase` on the wire to match spec.md §6's JSON surface
/// (`{version, isTransformed}`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub version: Version,
    pub is_transformed: bool,
    pub payload: serde_json::Value,
}

/// The contents of one slot in `Ops(D)`.
#[derive(Clone, Debug)]
pub enum Slot {
    /// Reserved but not yet committed. Carries the time it was reserved so
    /// the reaper can expire a slot that outlives the OT transform's
    /// worst-case runtime (spec §5, "Cancellation and timeouts").
    Pending { reserved_at: SystemTime },
    Committed(Operation),
}

impl Slot {
    pub fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending { .. })
    }
}

/// Per-document ledger: version counter, persisted tip, and the slotted
/// operation log. `ops` doubles as `Ops(D)` and `Idx(D)` — a `BTreeMap` is
/// already ordered by version, so no separate index is needed in-process.
#[derive(Debug, Default)]
pub struct Ledger {
    pub version: Version,
    pub persisted_version: Version,
    pub ops: BTreeMap<Version, Slot>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger { version: 0, persisted_version: 0, ops: BTreeMap::new() }
    }

    /// Longest contiguous committed prefix of `ops` starting at `from`
    /// (inclusive), stopping at the first missing or `Pending` slot.
    pub fn contiguous_committed_from(&self, from: Version) -> Vec<Operation> {
        let mut out = Vec::new();
        let mut v = from;
        loop {
            match self.ops.get(&v) {
                Some(Slot::Committed(op)) => {
                    out.push(op.clone());
                    v += 1;
                }
                _ => break,
            }
        }
        out
    }

    /// True if every version in `(self.persisted_version, upto)` exists and
    /// is committed — the CAS precondition for `commit`.
    pub fn all_committed_before(&self, upto: Version) -> bool {
        let mut v = self.persisted_version + 1;
        while v < upto {
            match self.ops.get(&v) {
                Some(Slot::Committed(_)) => v += 1,
                _ => return false,
            }
        }
        true
    }

    pub fn is_empty_pending_range(&self) -> bool {
        self.ops.is_empty()
    }
}

/// One connected WebSocket session (spec §4.6).
#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub session_id: crate::ids::SessionId,
    pub user_name: String,
    pub last_heartbeat: SystemTime,
    pub last_action: SystemTime,
    pub last_save: Option<SystemTime>,
}

impl SessionRecord {
    pub fn new(session_id: crate::ids::SessionId, user_name: String) -> Self {
        let now = SystemTime::now();
        SessionRecord { session_id, user_name, last_heartbeat: now, last_action: now, last_save: None }
    }

    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.last_heartbeat.elapsed().map(|e| e > threshold).unwrap_or(false)
    }
}
