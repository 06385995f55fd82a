//! C7 — Fan-out Hub. In-process publish/subscribe keyed by document id.
//!
//! A `tokio::sync::broadcast` channel is created lazily per document on
//! first subscribe and torn down when the reaper evicts the document — the
//! hub never outlives the ledger it reports on. Spec §4.7 is explicit that
//! cross-instance fan-out via the store's own pub/sub is an acceptable
//! future extension, not required here: every instance can always recover
//! via `getSince`.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::ids::{DocumentId, SessionId};
use crate::model::Operation;

#[derive(Clone, Debug)]
pub enum FanoutEvent {
    OpCommitted(Operation),
    UserJoined(Vec<String>),
    UserLeft(SessionId),
}

impl FanoutEvent {
    /// The WebSocket frame header spec.md §6 names for this event:
    /// `action ∈ {updateAction, addUser, removeUser}`.
    pub fn action_name(&self) -> &'static str {
        match self {
            FanoutEvent::OpCommitted(_) => "updateAction",
            FanoutEvent::UserJoined(_) => "addUser",
            FanoutEvent::UserLeft(_) => "removeUser",
        }
    }
}

const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct FanoutHub {
    channels: Mutex<HashMap<DocumentId, broadcast::Sender<FanoutEvent>>>,
}

impl FanoutHub {
    pub fn new() -> Self {
        FanoutHub { channels: Mutex::new(HashMap::new()) }
    }

    pub fn subscribe(&self, document: DocumentId) -> broadcast::Receiver<FanoutEvent> {
        let mut guard = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        guard
            .entry(document)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn publish(&self, document: DocumentId, event: FanoutEvent) {
        let guard = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(tx) = guard.get(&document) {
            // No subscribers is not an error: a document can have committed
            // ops before any client connects.
            let _ = tx.send(event);
        }
    }

    /// Drop the channel for a reaped document so idle broadcast buffers
    /// don't accumulate across the process lifetime.
    pub fn evict(&self, document: DocumentId) {
        let mut guard = self.channels.lock().unwrap_or_else(|p| p.into_inner());
        guard.remove(&document);
    }
}
