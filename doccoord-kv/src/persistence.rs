//! C5 — Persistence Coordinator (spec §4.5). UI-triggered save: the client
//! holds the authoritative "latest applied" version and has already
//! rendered that state, so the server never maintains its own in-memory
//! replica of the document — it only tracks the version boundary.

use std::sync::Arc;

use tracing::{error, instrument};

use crate::collaborators::{DocumentCodec, ObjectStore};
use crate::error::CResult;
use crate::ids::DocumentId;
use crate::model::Version;
use crate::session::{SessionRegistry, Touch};
use crate::store::Store;

pub struct ShouldSaveResult {
    pub should_save: bool,
    pub persisted_version: Version,
}

pub struct SaveResult {
    pub skipped: bool,
}

pub struct PersistenceCoordinator {
    store: Arc<dyn Store>,
    document_codec: Arc<dyn DocumentCodec>,
    object_store: Arc<dyn ObjectStore>,
    sessions: Arc<SessionRegistry>,
}

impl PersistenceCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        document_codec: Arc<dyn DocumentCodec>,
        object_store: Arc<dyn ObjectStore>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        PersistenceCoordinator { store, document_codec, object_store, sessions }
    }

    /// `shouldSave(D, clientAppliedVersion) → {shouldSave, persistedVersion}`.
    pub fn should_save(&self, document: DocumentId, client_applied_version: Version) -> CResult<ShouldSaveResult> {
        let (_version, persisted) = self.store.versions(document)?;
        Ok(ShouldSaveResult {
            should_save: client_applied_version > persisted,
            persisted_version: persisted,
        })
    }

    /// `save(D, sfdt, clientAppliedVersion) → {skipped}` (spec §4.5). On a
    /// stale request (`clientAppliedVersion <= P(D)`) the store is never
    /// touched. Step (2), the object-store upload, is the only step that can
    /// fail without leaving the ledger inconsistent: a failure there
    /// surfaces as `Error::ObjectStoreFailure` with `P(D)` untouched, so a
    /// retry redoes exactly the missing work.
    #[instrument(skip(self, sfdt), fields(%document, %client_applied_version))]
    pub async fn save(
        &self,
        document: DocumentId,
        user_name: &str,
        sfdt: serde_json::Value,
        client_applied_version: Version,
    ) -> CResult<SaveResult> {
        let (_version, persisted) = self.store.versions(document)?;
        if client_applied_version <= persisted {
            return Ok(SaveResult { skipped: true });
        }

        let bytes = self.document_codec.serialize(document, &sfdt).await?;
        if let Err(err) = self.object_store.upload(document, bytes).await {
            error!(%document, %err, "failed to save document");
            return Err(err);
        }

        self.store.save_cleanup(document, client_applied_version)?;
        self.sessions.touch(document, user_name, Touch::save());

        Ok(SaveResult { skipped: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CommitOutcome, MemoryStore, ReserveOutcome};

    struct PassthroughCodec;
    #[async_trait::async_trait]
    impl DocumentCodec for PassthroughCodec {
        async fn deserialize(&self, _document: DocumentId, bytes: &[u8]) -> CResult<serde_json::Value> {
            Ok(serde_json::from_slice(bytes).unwrap_or(serde_json::Value::Null))
        }
        async fn serialize(&self, _document: DocumentId, sfdt: &serde_json::Value) -> CResult<Vec<u8>> {
            Ok(serde_json::to_vec(sfdt).unwrap())
        }
    }

    struct RecordingObjectStore {
        uploads: std::sync::Mutex<Vec<Vec<u8>>>,
    }
    #[async_trait::async_trait]
    impl ObjectStore for RecordingObjectStore {
        async fn download(&self, _document: DocumentId) -> CResult<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn upload(&self, _document: DocumentId, bytes: Vec<u8>) -> CResult<()> {
            self.uploads.lock().unwrap().push(bytes);
            Ok(())
        }
    }

    #[tokio::test]
    async fn save_prunes_slots_below_the_new_persisted_tip() {
        let store = Arc::new(MemoryStore::new());
        let document = DocumentId::new();
        let v1 = match store.reserve(document, 0).unwrap() {
            ReserveOutcome::Reserved { new_version, .. } => new_version,
            _ => panic!(),
        };
        assert_eq!(store.commit(document, v1, serde_json::json!({})).unwrap(), CommitOutcome::Ok);

        let coordinator = PersistenceCoordinator::new(
            store.clone(),
            Arc::new(PassthroughCodec),
            Arc::new(RecordingObjectStore { uploads: Default::default() }),
            Arc::new(SessionRegistry::new()),
        );

        let result = coordinator.save(document, "alice", serde_json::json!({"sfdt": true}), v1).await.unwrap();
        assert!(!result.skipped);
        let (_, persisted) = store.versions(document).unwrap();
        assert_eq!(persisted, v1);
    }

    #[tokio::test]
    async fn save_below_persisted_tip_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let document = DocumentId::new();
        let v1 = match store.reserve(document, 0).unwrap() {
            ReserveOutcome::Reserved { new_version, .. } => new_version,
            _ => panic!(),
        };
        store.commit(document, v1, serde_json::json!({})).unwrap();
        store.save_cleanup(document, v1).unwrap();

        let coordinator = PersistenceCoordinator::new(
            store,
            Arc::new(PassthroughCodec),
            Arc::new(RecordingObjectStore { uploads: Default::default() }),
            Arc::new(SessionRegistry::new()),
        );

        let result = coordinator.save(document, "alice", serde_json::json!({}), v1).await.unwrap();
        assert!(result.skipped);
    }
}
