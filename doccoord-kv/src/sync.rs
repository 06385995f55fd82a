//! C4 — Sync Service (spec §4.4). The read path: a fresh client imports the
//! document and every operation committed since the last save, and a
//! reconnecting client asks what it missed via `getSince`.

use std::sync::Arc;

use tracing::instrument;

use crate::collaborators::{DocumentCodec, ObjectStore};
use crate::error::CResult;
use crate::ids::{DocumentId, SessionId};
use crate::model::Version;
use crate::session::{SessionRegistry, Touch};
use crate::store::{GetPendingResult, Store};
use crate::transform::OtApply;

pub struct ImportResult {
    pub sfdt: serde_json::Value,
    pub version: Version,
}

pub struct SyncService {
    store: Arc<dyn Store>,
    document_codec: Arc<dyn DocumentCodec>,
    object_store: Arc<dyn ObjectStore>,
    ot_apply: Arc<dyn OtApply>,
    sessions: Arc<SessionRegistry>,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn Store>,
        document_codec: Arc<dyn DocumentCodec>,
        object_store: Arc<dyn ObjectStore>,
        ot_apply: Arc<dyn OtApply>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        SyncService { store, document_codec, object_store, ot_apply, sessions }
    }

    /// `import(D) → {sfdt, version}` (spec §4.4). Loads the binary document,
    /// applies every committed operation in the contiguous prefix of
    /// `(P(D), V(D)]`, and stamps the result.
    ///
    /// A non-contiguous suffix (a `PENDING` slot in the middle) only applies
    /// the contiguous prefix; the stamp reflects what was actually folded
    /// into `sfdt`, not the raw version counter, so a client never believes
    /// content it was not given is already present (spec §8 scenario 6).
    #[instrument(skip(self), fields(%document))]
    pub async fn import(
        &self,
        document: DocumentId,
        session_id: Option<SessionId>,
        user_name: Option<&str>,
    ) -> CResult<ImportResult> {
        self.store.init(document)?;
        self.store.ensure_min(document)?;
        let (_version, persisted) = self.store.versions(document)?;

        let bytes = self.object_store.download(document).await?;
        let mut sfdt = self.document_codec.deserialize(document, &bytes).await?;

        let pending = self.store.get_pending(document, persisted)?;
        let mut max_applied = persisted;
        for op in &pending.ops {
            sfdt = self.ot_apply.apply(sfdt, op)?;
            max_applied = max_applied.max(op.version);
        }

        if let (Some(_sid), Some(user_name)) = (session_id, user_name) {
            self.sessions.touch(document, user_name, Touch::action());
        }

        Ok(ImportResult { sfdt, version: max_applied.max(persisted) })
    }

    /// `getSince(D, clientVersion) → {ops[], resync, windowStart}` (spec
    /// §4.4): a pure pass-through to `get-pending`.
    pub fn get_since(&self, document: DocumentId, client_version: Version) -> CResult<GetPendingResult> {
        self.store.get_pending(document, client_version)
    }
}
