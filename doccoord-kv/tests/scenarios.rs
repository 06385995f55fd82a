//! End-to-end scenarios from spec.md §8, exercised through the public
//! [`doccoord_kv::Engine`] facade rather than the individual components.

use std::sync::Arc;

use doccoord_kv::collaborators::{DocumentCodec, ObjectStore};
use doccoord_kv::error::Error;
use doccoord_kv::ids::{DocumentId, SessionId};
use doccoord_kv::pipeline::RequestContext;
use doccoord_kv::store::MemoryStore;
use doccoord_kv::transform::{IdentityApply, IdentityTransform};
use doccoord_kv::{Engine, EngineConfig};

struct NullDocumentCodec;
#[async_trait::async_trait]
impl DocumentCodec for NullDocumentCodec {
    async fn deserialize(&self, _document: DocumentId, _bytes: &[u8]) -> doccoord_kv::CResult<serde_json::Value> {
        Ok(serde_json::json!({}))
    }
    async fn serialize(&self, _document: DocumentId, sfdt: &serde_json::Value) -> doccoord_kv::CResult<Vec<u8>> {
        Ok(serde_json::to_vec(sfdt).unwrap())
    }
}

struct NullObjectStore;
#[async_trait::async_trait]
impl ObjectStore for NullObjectStore {
    async fn download(&self, _document: DocumentId) -> doccoord_kv::CResult<Vec<u8>> {
        Ok(Vec::new())
    }
    async fn upload(&self, _document: DocumentId, _bytes: Vec<u8>) -> doccoord_kv::CResult<()> {
        Ok(())
    }
}

fn engine() -> Engine {
    Engine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(IdentityTransform),
        Arc::new(IdentityApply),
        Arc::new(NullDocumentCodec),
        Arc::new(NullObjectStore),
        EngineConfig::default(),
    )
}

fn ctx(document: DocumentId, user_name: &str) -> RequestContext {
    RequestContext { document, session_id: SessionId::new(), user_name: user_name.into() }
}

#[tokio::test]
async fn scenario_1_single_writer() {
    let engine = engine();
    let document = DocumentId::new();

    let committed = engine.pipeline.submit(&ctx(document, "alice"), 0, serde_json::json!({"insert": "hi"})).await.unwrap();
    assert_eq!(committed.version, 1);
    assert!(committed.is_transformed);

    let since = engine.sync.get_since(document, 0).unwrap();
    assert_eq!(since.ops.len(), 1);
    assert_eq!(since.ops[0].version, 1);

    let (version, persisted) = engine.store.versions(document).unwrap();
    assert_eq!(version, 1);
    assert_eq!(persisted, 0);
}

#[tokio::test]
async fn scenario_2_concurrent_writers_same_base() {
    let engine = Arc::new(engine());
    let document = DocumentId::new();

    let a = {
        let engine = engine.clone();
        let ctx = ctx(document, "alice");
        tokio::spawn(async move { engine.pipeline.submit(&ctx, 0, serde_json::json!({"n": "a"})).await.unwrap() })
    };
    let b = {
        let engine = engine.clone();
        let ctx = ctx(document, "bob");
        tokio::spawn(async move { engine.pipeline.submit(&ctx, 0, serde_json::json!({"n": "b"})).await.unwrap() })
    };

    let mut versions = vec![a.await.unwrap().version, b.await.unwrap().version];
    versions.sort();
    assert_eq!(versions, vec![1, 2]);

    let since = engine.sync.get_since(document, 0).unwrap();
    assert_eq!(since.ops.iter().map(|o| o.version).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn scenario_3_save_then_stale_submit() {
    let engine = engine();
    let document = DocumentId::new();

    engine.pipeline.submit(&ctx(document, "alice"), 0, serde_json::json!({})).await.unwrap();
    engine.pipeline.submit(&ctx(document, "alice"), 0, serde_json::json!({})).await.unwrap();

    let save = engine.persistence.save(document, "alice", serde_json::json!({}), 2).await.unwrap();
    assert!(!save.skipped);

    let err = engine.pipeline.submit(&ctx(document, "bob"), 1, serde_json::json!({})).await.unwrap_err();
    match err {
        Error::StaleClient { persisted_version } => assert_eq!(persisted_version, 2),
        other => panic!("expected StaleClient, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_4_reaper_evicts_idle_document() {
    let engine = engine();
    let document = DocumentId::new();

    for _ in 0..3 {
        engine.pipeline.submit(&ctx(document, "alice"), 0, serde_json::json!({})).await.unwrap();
    }
    // No sessions were ever registered through `add_session`, so the
    // document is immediately eligible once its ops are pruned by a save.
    engine.persistence.save(document, "alice", serde_json::json!({}), 3).await.unwrap();

    let stats = engine.reaper.reap_once();
    assert_eq!(stats.documents_evicted, 1);

    let (version, persisted) = engine.store.versions(document).unwrap();
    assert_eq!((version, persisted), (0, 0));
}

#[tokio::test]
async fn scenario_5_gap_recovery_after_abandoned_slot() {
    use doccoord_kv::store::{CommitOutcome, ReserveOutcome, Store};

    let store = MemoryStore::new();
    let document = DocumentId::new();

    // Commit versions 1-3 normally.
    for _ in 0..3 {
        let v = match store.reserve(document, 0).unwrap() {
            ReserveOutcome::Reserved { new_version, .. } => new_version,
            _ => panic!(),
        };
        assert_eq!(store.commit(document, v, serde_json::json!({})).unwrap(), CommitOutcome::Ok);
    }

    // Simulate a crash between reserve and commit at v=5 by reserving twice
    // (leaking v=4) and never committing the leaked slot.
    let leaked = match store.reserve(document, 0).unwrap() {
        ReserveOutcome::Reserved { new_version, .. } => new_version,
        _ => panic!(),
    };
    assert_eq!(leaked, 4);

    let next = match store.reserve(document, 0).unwrap() {
        ReserveOutcome::Reserved { new_version, .. } => new_version,
        _ => panic!(),
    };
    assert_eq!(next, 5);

    // Any commit whose own version is beyond the leaked slot stalls on it.
    let outcome = store.commit(document, next, serde_json::json!({})).unwrap();
    assert_eq!(outcome, CommitOutcome::PendingBefore);

    // Operator (or a timed reaper extension) reaps the stale pending slot.
    store.abandon(document, leaked).unwrap();

    let outcome = store.commit(document, next, serde_json::json!({})).unwrap();
    assert_eq!(outcome, CommitOutcome::GapBefore);
}

#[tokio::test]
async fn scenario_6_import_with_pending_only_stamps_contiguous_prefix() {
    use doccoord_kv::store::{CommitOutcome, ReserveOutcome, Store};

    let store = Arc::new(MemoryStore::new());
    let document = DocumentId::new();

    let mut versions = Vec::new();
    for _ in 0..4 {
        let v = match store.reserve(document, 0).unwrap() {
            ReserveOutcome::Reserved { new_version, .. } => new_version,
            _ => panic!(),
        };
        versions.push(v);
    }
    for v in &versions[..3] {
        assert_eq!(store.commit(document, *v, serde_json::json!({})).unwrap(), CommitOutcome::Ok);
    }
    // versions[3] stays PENDING.

    let engine = Engine::new(
        store,
        Arc::new(IdentityTransform),
        Arc::new(IdentityApply),
        Arc::new(NullDocumentCodec),
        Arc::new(NullObjectStore),
        EngineConfig::default(),
    );

    let imported = engine.sync.import(document, None, None).await.unwrap();
    assert_eq!(imported.version, 3);
}

#[tokio::test]
async fn retries_exhausted_abandons_the_reserved_slot() {
    // A pipeline whose transform always fails still leaves the ledger
    // gapless: the reserved slot is abandoned before the error propagates.
    struct FailingTransform;
    impl doccoord_kv::transform::OtTransform for FailingTransform {
        fn transform(
            &self,
            _op: doccoord_kv::Operation,
            _context: doccoord_kv::transform::TransformContext<'_>,
        ) -> doccoord_kv::CResult<doccoord_kv::Operation> {
            Err(Error::OtTransformFailure("boom".into()))
        }
    }

    let store = Arc::new(MemoryStore::new());
    let pipeline = doccoord_kv::pipeline::OperationPipeline::new(
        store.clone(),
        Arc::new(FailingTransform),
        Arc::new(doccoord_kv::fanout::FanoutHub::new()),
        Arc::new(doccoord_kv::session::SessionRegistry::new()),
        5,
    );

    let document = DocumentId::new();
    let err = pipeline.submit(&ctx(document, "alice"), 0, serde_json::json!({})).await.unwrap_err();
    assert!(matches!(err, Error::OtTransformFailure(_)));

    // The slot must not remain PENDING.
    let since = store.get_pending(document, 0).unwrap();
    assert!(since.ops.is_empty());
    let (version, _) = store.versions(document).unwrap();
    assert_eq!(version, 1); // version counter still advanced, but the slot is gone
}
