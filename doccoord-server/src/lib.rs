//! `doccoord-server` exposes the [`doccoord_kv`] coordination engine over
//! HTTP and WebSocket, the way the pack's axum dashboard server exposes its
//! own engine: a thin `Router` builder the binary and integration tests
//! both call into.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod http;
pub mod state;
pub mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use doccoord_kv::Engine;

use collaborators::{FsObjectStore, PassthroughDocumentCodec};
use config::Config;
use doccoord_kv::store::MemoryStore;
use doccoord_kv::transform::{IdentityApply, IdentityTransform};
use state::AppState;

/// Builds the engine this binary runs with. The OT transform/apply
/// functions and the coordination store are external collaborators (spec
/// §1 Non-goals); this wires in the in-process reference implementations
/// every test and local deployment uses until a real OT library and a
/// networked store are substituted.
pub fn build_engine(config: &Config) -> Arc<Engine> {
    let store = Arc::new(MemoryStore::new());
    let object_store = Arc::new(FsObjectStore::new(config.object_store.local_path.clone()));
    Arc::new(Engine::new(
        store,
        Arc::new(IdentityTransform),
        Arc::new(IdentityApply),
        Arc::new(PassthroughDocumentCodec),
        object_store,
        config.engine_config(),
    ))
}

pub fn build_router(state: AppState) -> Router {
    http::router()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> &'static str {
    "ok"
}
