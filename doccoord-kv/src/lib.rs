//! `doccoord-kv` is the Operation Coordination Engine for real-time
//! collaborative rich-text editing: it assigns a gapless, monotonically
//! increasing version to every accepted edit, runs Operational Transformation
//! against the correct prior context without holding long locks, commits the
//! transformed result under compare-and-swap, serves missed operations to
//! lagging clients, and coordinates the boundary that advances a persisted
//! tip so cache pruning stays safe under concurrent writers.
//!
//! The crate is transport-agnostic: HTTP/WebSocket framing, authentication,
//! the document codec, the object-store client, and the OT transform
//! function itself are all external collaborators reached through narrow
//! traits ([`collaborators::DocumentCodec`], [`collaborators::ObjectStore`],
//! [`transform::OtTransform`], [`transform::OtApply`]). A caller wires real
//! implementations of those traits together with a [`store::Store`] into an
//! [`Engine`], which is the one type a server binary needs to hold.

pub mod collaborators;
pub mod error;
pub mod fanout;
pub mod ids;
pub mod model;
pub mod persistence;
pub mod pipeline;
pub mod reaper;
pub mod session;
pub mod store;
pub mod sync;
pub mod transform;

use std::sync::Arc;
use std::time::Duration;

pub use error::{CResult, Error};
pub use ids::{DocumentId, SessionId};
pub use model::{Operation, Version};

use collaborators::{DocumentCodec, ObjectStore};
use fanout::FanoutHub;
use persistence::PersistenceCoordinator;
use pipeline::OperationPipeline;
use reaper::Reaper;
use session::{SessionRegistry, DEFAULT_STALE_THRESHOLD};
use store::Store;
use sync::SyncService;
use transform::{OtApply, OtTransform};

/// Tunables spec.md §6 lists as configuration: `maxRetries` and
/// `staleSessionMinutes`. The server binary's `Config` carries the
/// user-facing (TOML/env) form; this is the engine-facing form it resolves
/// to.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    pub max_retries: u32,
    pub stale_session_threshold: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_retries: pipeline::DEFAULT_MAX_RETRIES,
            stale_session_threshold: DEFAULT_STALE_THRESHOLD,
        }
    }
}

/// The whole Operation Coordination Engine, components C1-C8 of spec.md
/// wired together. A server binary owns one `Engine` per process and
/// extracts a [`pipeline::RequestContext`] at the transport edge for every
/// request it hands to it.
pub struct Engine {
    pub store: Arc<dyn Store>,
    pub pipeline: OperationPipeline,
    pub sync: SyncService,
    pub persistence: PersistenceCoordinator,
    pub sessions: Arc<SessionRegistry>,
    pub fanout: Arc<FanoutHub>,
    pub reaper: Arc<Reaper>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        transform: Arc<dyn OtTransform>,
        ot_apply: Arc<dyn OtApply>,
        document_codec: Arc<dyn DocumentCodec>,
        object_store: Arc<dyn ObjectStore>,
        config: EngineConfig,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new());
        let fanout = Arc::new(FanoutHub::new());

        let pipeline = OperationPipeline::new(
            store.clone(),
            transform,
            fanout.clone(),
            sessions.clone(),
            config.max_retries,
        );

        let sync = SyncService::new(
            store.clone(),
            document_codec.clone(),
            object_store.clone(),
            ot_apply,
            sessions.clone(),
        );

        let persistence = PersistenceCoordinator::new(
            store.clone(),
            document_codec,
            object_store,
            sessions.clone(),
        );

        let reaper = Arc::new(Reaper::new(
            store.clone(),
            sessions.clone(),
            fanout.clone(),
            config.stale_session_threshold,
        ));

        Engine { store, pipeline, sync, persistence, sessions, fanout, reaper }
    }
}
