//! C8 — Reaper (spec §4.8). Runs on a fixed cadence: expires stale sessions,
//! then evicts the ledger for any document left with zero sessions and zero
//! pending operations.
//!
//! The two checks are deliberately not atomic with each other (spec §4.8):
//! a session that joins between them keeps the ledger alive on the next
//! tick, and a session that joins mid-eviction simply re-creates the ledger
//! via `init(D)` on its next import.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::fanout::{FanoutEvent, FanoutHub};
use crate::ids::DocumentId;
use crate::session::SessionRegistry;
use crate::store::Store;

pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// Worst-case OT transform runtime a reserved slot is given before the
/// reaper expires it (spec §5).
pub const DEFAULT_PENDING_EXPIRY: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapStats {
    pub stale_sessions: usize,
    pub documents_evicted: usize,
    pub pending_slots_expired: usize,
}

pub struct Reaper {
    store: Arc<dyn Store>,
    sessions: Arc<SessionRegistry>,
    fanout: Arc<FanoutHub>,
    stale_threshold: Duration,
    pending_expiry: Duration,
}

impl Reaper {
    pub fn new(
        store: Arc<dyn Store>,
        sessions: Arc<SessionRegistry>,
        fanout: Arc<FanoutHub>,
        stale_threshold: Duration,
    ) -> Self {
        Reaper { store, sessions, fanout, stale_threshold, pending_expiry: DEFAULT_PENDING_EXPIRY }
    }

    pub fn with_pending_expiry(mut self, pending_expiry: Duration) -> Self {
        self.pending_expiry = pending_expiry;
        self
    }

    /// One reaper tick (spec §4.8 steps 1-2, plus the §5 pending-slot
    /// expiry), callable directly from tests.
    pub fn reap_once(&self) -> ReapStats {
        let expired = self.store.expire_stale_pending(self.pending_expiry);
        for (document, version) in &expired {
            warn!(%document, %version, "expired stale PENDING slot");
        }

        let stale = self.sessions.reap_stale(self.stale_threshold);
        for (document, session_id) in &stale {
            self.fanout.publish(*document, FanoutEvent::UserLeft(*session_id));
        }

        // The active-document set (spec §3) is the union of "has a session"
        // and "has a ledger at all" (a fully-persisted document is still
        // born until this reaper evicts it); we derive it from the store and
        // session registry rather than maintaining it separately, which
        // keeps it trivially consistent.
        let pending_docs: HashSet<DocumentId> = self.store.documents_with_pending_ops().into_iter().collect();
        let mut candidates: HashSet<DocumentId> = self.sessions.active_documents().into_iter().collect();
        candidates.extend(self.store.known_documents());

        let mut documents_evicted = 0;
        for document in candidates {
            if self.sessions.is_empty(document) && !pending_docs.contains(&document) {
                self.store.evict(document);
                self.fanout.evict(document);
                documents_evicted += 1;
            }
        }

        ReapStats { stale_sessions: stale.len(), documents_evicted, pending_slots_expired: expired.len() }
    }

    /// Runs [`Self::reap_once`] on a fixed cadence until the process exits.
    /// Owned by the server binary (spec §4.8 is a periodic task, not a
    /// request-scoped component), so it needs no transport types.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let stats = self.reap_once();
            if stats.stale_sessions > 0 || stats.documents_evicted > 0 {
                info!(
                    stale_sessions = stats.stale_sessions,
                    documents_evicted = stats.documents_evicted,
                    "reaper tick"
                );
            }
        }
    }
}
