//! C1 — Key-Value Coordinator.
//!
//! Exposes the six atomic primitives of spec §4.1 over a shared ledger
//! table. [`Store`] is a trait so a networked scripted store (Lua against a
//! shared KV server, say) can stand in for [`MemoryStore`] without any
//! change to the pipeline, sync, or persistence layers above it — the same
//! separation the teacher draws between its `Engine` trait and the
//! concrete log-structured engine behind it.
//!
//! [`MemoryStore`] realizes "atomic script" as "hold one mutex across the
//! whole primitive". That is the entire synchronization story: the mutex is
//! never held across an `.await`, so a worker can never deadlock waiting on
//! the store (spec §5).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use crate::error::{CResult, Error};
use crate::ids::DocumentId;
use crate::model::{Ledger, Operation, Slot, Version};

pub struct InitResult {
    pub created: bool,
}

pub enum ReserveOutcome {
    StaleClient { persisted_version: Version },
    Reserved { new_version: Version, prior_ops: Vec<Operation> },
}

#[derive(Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Ok,
    VersionConflict,
    GapBefore,
    PendingBefore,
}

pub struct GetPendingResult {
    pub ops: Vec<Operation>,
    pub resync: bool,
    pub window_start: Version,
}

/// The six atomic primitives of spec §4.1. Implementors must provide the
/// invariants of spec §3 at the end of every call.
pub trait Store: Send + Sync {
    fn init(&self, document: DocumentId) -> CResult<InitResult>;

    fn ensure_min(&self, document: DocumentId) -> CResult<Version>;

    fn reserve(&self, document: DocumentId, client_version: Version) -> CResult<ReserveOutcome>;

    fn commit(
        &self,
        document: DocumentId,
        version: Version,
        payload: serde_json::Value,
    ) -> CResult<CommitOutcome>;

    fn abandon(&self, document: DocumentId, version: Version) -> CResult<()>;

    fn get_pending(&self, document: DocumentId, client_version: Version) -> CResult<GetPendingResult>;

    fn save_cleanup(&self, document: DocumentId, saved_version: Version) -> CResult<()>;

    /// Current `(V(D), P(D))`, for diagnostics and the sync/persistence
    /// layers. Not one of the six CAS primitives (read-only, no
    /// precondition), matching spec §5's "readers that do not need strict
    /// ordering may use direct key reads".
    fn versions(&self, document: DocumentId) -> CResult<(Version, Version)>;

    /// Remove every ledger key for `document`. Used by the reaper (C8) once
    /// a document has no sessions and no pending operations.
    fn evict(&self, document: DocumentId);

    /// Document ids whose `Ops(D)` is non-empty (at least one slot, pending
    /// or committed, not yet pruned). Used by the reaper to decide whether a
    /// document is still dirty.
    fn documents_with_pending_ops(&self) -> Vec<DocumentId>;

    /// Every document id with a ledger entry at all, whether or not its
    /// `Ops(D)` is currently empty (spec §3: "the active-document set ...
    /// at least one session or at least one non-empty ledger" — a ledger
    /// that has been fully persisted but not yet reaped is still "born").
    /// Part of the reaper's liveness union.
    fn known_documents(&self) -> Vec<DocumentId>;

    /// Deletes any `PENDING` slot reserved longer than `older_than` ago
    /// (spec §5: "implementations SHOULD time-bound PENDING slots ... and
    /// let the reaper delete slots older than the OT transform's worst-case
    /// runtime"). Returns the `(document, version)` pairs it expired so the
    /// caller can log them; expiring a slot re-opens a gap for any commit
    /// still waiting behind it, exactly like an explicit `abandon`.
    fn expire_stale_pending(&self, older_than: std::time::Duration) -> Vec<(DocumentId, Version)>;
}

#[derive(Default)]
pub struct MemoryStore {
    ledgers: Mutex<HashMap<DocumentId, Ledger>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore { ledgers: Mutex::new(HashMap::new()) }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DocumentId, Ledger>> {
        self.ledgers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Store for MemoryStore {
    fn init(&self, document: DocumentId) -> CResult<InitResult> {
        let mut guard = self.lock();
        if guard.contains_key(&document) {
            return Ok(InitResult { created: false });
        }
        guard.insert(document, Ledger::new());
        Ok(InitResult { created: true })
    }

    fn ensure_min(&self, document: DocumentId) -> CResult<Version> {
        let mut guard = self.lock();
        let ledger = guard.entry(document).or_insert_with(Ledger::new);
        if ledger.version < ledger.persisted_version {
            ledger.version = ledger.persisted_version;
        }
        Ok(ledger.version)
    }

    fn reserve(&self, document: DocumentId, client_version: Version) -> CResult<ReserveOutcome> {
        let mut guard = self.lock();
        let ledger = guard.entry(document).or_insert_with(Ledger::new);

        if client_version < ledger.persisted_version {
            return Ok(ReserveOutcome::StaleClient { persisted_version: ledger.persisted_version });
        }

        let prior_ops = ledger.contiguous_committed_from(client_version + 1);
        let new_version = ledger.version + 1;
        ledger.version = new_version;
        ledger.ops.insert(new_version, Slot::Pending { reserved_at: SystemTime::now() });

        Ok(ReserveOutcome::Reserved { new_version, prior_ops })
    }

    fn commit(
        &self,
        document: DocumentId,
        version: Version,
        payload: serde_json::Value,
    ) -> CResult<CommitOutcome> {
        let mut guard = self.lock();
        let ledger = match guard.get_mut(&document) {
            Some(l) => l,
            None => return Ok(CommitOutcome::VersionConflict),
        };

        if !ledger.all_committed_before(version) {
            // Distinguish "still pending" from "missing entirely" for the
            // caller's diagnostics, though the pipeline treats both the same.
            let mut v = ledger.persisted_version + 1;
            while v < version {
                match ledger.ops.get(&v) {
                    Some(Slot::Committed(_)) => v += 1,
                    Some(Slot::Pending { .. }) => return Ok(CommitOutcome::PendingBefore),
                    None => return Ok(CommitOutcome::GapBefore),
                }
            }
        }

        match ledger.ops.get(&version) {
            Some(Slot::Pending { .. }) => {
                ledger.ops.insert(
                    version,
                    Slot::Committed(Operation { version, is_transformed: true, payload }),
                );
                Ok(CommitOutcome::Ok)
            }
            _ => Ok(CommitOutcome::VersionConflict),
        }
    }

    fn abandon(&self, document: DocumentId, version: Version) -> CResult<()> {
        let mut guard = self.lock();
        if let Some(ledger) = guard.get_mut(&document) {
            ledger.ops.remove(&version);
        }
        Ok(())
    }

    fn get_pending(&self, document: DocumentId, client_version: Version) -> CResult<GetPendingResult> {
        let guard = self.lock();
        let ledger = match guard.get(&document) {
            Some(l) => l,
            None => return Ok(GetPendingResult { ops: Vec::new(), resync: false, window_start: 1 }),
        };

        if client_version < ledger.persisted_version {
            return Ok(GetPendingResult {
                ops: Vec::new(),
                resync: true,
                window_start: ledger.persisted_version + 1,
            });
        }

        let ops = ledger.contiguous_committed_from(client_version + 1);
        Ok(GetPendingResult { ops, resync: false, window_start: ledger.persisted_version + 1 })
    }

    fn save_cleanup(&self, document: DocumentId, saved_version: Version) -> CResult<()> {
        let mut guard = self.lock();
        let ledger = match guard.get_mut(&document) {
            Some(l) => l,
            None => return Ok(()),
        };
        if saved_version > ledger.persisted_version {
            ledger.persisted_version = saved_version;
        }
        // Invariant 3 (spec §3): slots <= P(D) are absent from Ops(D).
        let tip = ledger.persisted_version;
        ledger.ops.retain(|v, _| *v > tip);
        Ok(())
    }

    fn versions(&self, document: DocumentId) -> CResult<(Version, Version)> {
        let guard = self.lock();
        match guard.get(&document) {
            Some(l) => Ok((l.version, l.persisted_version)),
            None => Ok((0, 0)),
        }
    }

    fn evict(&self, document: DocumentId) {
        let mut guard = self.lock();
        guard.remove(&document);
    }

    fn documents_with_pending_ops(&self) -> Vec<DocumentId> {
        let guard = self.lock();
        guard
            .iter()
            .filter(|(_, ledger)| !ledger.is_empty_pending_range())
            .map(|(id, _)| *id)
            .collect()
    }

    fn known_documents(&self) -> Vec<DocumentId> {
        let guard = self.lock();
        guard.keys().copied().collect()
    }

    fn expire_stale_pending(&self, older_than: std::time::Duration) -> Vec<(DocumentId, Version)> {
        let mut guard = self.lock();
        let mut expired = Vec::new();
        let now = SystemTime::now();
        for (document, ledger) in guard.iter_mut() {
            let stale_versions: Vec<Version> = ledger
                .ops
                .iter()
                .filter_map(|(v, slot)| match slot {
                    Slot::Pending { reserved_at } if now.duration_since(*reserved_at).unwrap_or_default() > older_than => Some(*v),
                    _ => None,
                })
                .collect();
            for v in stale_versions {
                ledger.ops.remove(&v);
                expired.push((*document, v));
            }
        }
        expired
    }
}

/// Surfaces `store-unavailable` if a caller ever needs to distinguish a
/// transport failure from a logical one; the in-process [`MemoryStore`]
/// never fails this way, but a networked `Store` would map its I/O errors
/// through here.
pub fn store_unavailable(msg: impl Into<String>) -> Error {
    Error::StoreUnavailable(msg.into())
}
