//! C3 — Operation Pipeline (spec §4.3).
//!
//! REDESIGN FLAGS: transport types never reach this module. Callers extract
//! a narrow [`RequestContext`] at the edge and pass it in explicitly.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::error::{CResult, Error};
use crate::fanout::{FanoutEvent, FanoutHub};
use crate::ids::{DocumentId, SessionId};
use crate::model::{Operation, Version};
use crate::session::{SessionRegistry, Touch};
use crate::store::{CommitOutcome, ReserveOutcome, Store};
use crate::transform::{OtTransform, TransformContext};

pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Identity and document correlated with a request, extracted once at the
/// transport edge (HTTP handler / WebSocket frame) and threaded through
/// explicitly — no `axum`/`tokio-tungstenite` type ever appears below this
/// line.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub document: DocumentId,
    pub session_id: SessionId,
    pub user_name: String,
}

pub struct OperationPipeline {
    store: Arc<dyn Store>,
    transform: Arc<dyn OtTransform>,
    fanout: Arc<FanoutHub>,
    sessions: Arc<SessionRegistry>,
    max_retries: u32,
}

impl OperationPipeline {
    pub fn new(
        store: Arc<dyn Store>,
        transform: Arc<dyn OtTransform>,
        fanout: Arc<FanoutHub>,
        sessions: Arc<SessionRegistry>,
        max_retries: u32,
    ) -> Self {
        OperationPipeline { store, transform, fanout, sessions, max_retries }
    }

    /// `submit(D, clientVersion, rawOp) → committedOp` (spec §4.3).
    #[instrument(skip(self, payload), fields(document = %ctx.document, user = %ctx.user_name))]
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        client_version: Version,
        payload: serde_json::Value,
    ) -> CResult<Operation> {
        let document = ctx.document;

        self.store.ensure_min(document)?;

        let (version, mut context_ops) = match self.store.reserve(document, client_version)? {
            ReserveOutcome::StaleClient { persisted_version } => {
                return Err(Error::StaleClient { persisted_version });
            }
            ReserveOutcome::Reserved { new_version, prior_ops } => (new_version, prior_ops),
        };

        let mut attempt = 0u32;
        loop {
            let raw = Operation { version, is_transformed: false, payload: payload.clone() };
            let transformed = match self
                .transform
                .transform(raw, TransformContext { prior_ops: &context_ops })
            {
                Ok(op) => op,
                Err(err) => {
                    warn!(error = %err, %version, "ot transform failed, abandoning slot");
                    self.store.abandon(document, version)?;
                    return Err(Error::OtTransformFailure(err.to_string()));
                }
            };

            match self.store.commit(document, version, transformed.payload.clone())? {
                CommitOutcome::Ok => {
                    self.sessions.touch(document, &ctx.user_name, Touch::action());
                    self.fanout.publish(document, FanoutEvent::OpCommitted(transformed.clone()));
                    info!(%version, "committed operation");
                    return Ok(transformed);
                }
                CommitOutcome::GapBefore | CommitOutcome::PendingBefore => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        self.store.abandon(document, version)?;
                        return Err(Error::RetriesExhausted { document_id: document, attempts: attempt });
                    }
                    // Re-read the committed prefix and retry with a fresh
                    // transform context; the slot at `version` stays
                    // reserved across retries.
                    let pending = self.store.get_pending(document, client_version)?;
                    context_ops = pending.ops;
                }
                CommitOutcome::VersionConflict => {
                    warn!(%version, "version conflict committing operation, retrying");
                    attempt += 1;
                    if attempt > self.max_retries {
                        self.store.abandon(document, version)?;
                        return Err(Error::RetriesExhausted { document_id: document, attempts: attempt });
                    }
                }
            }
            // `version` itself never changes across retries — the same
            // reserved slot is re-filled until it commits or is abandoned.
        }
    }
}
