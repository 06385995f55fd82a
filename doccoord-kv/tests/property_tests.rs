//! Property-based checks of spec.md §8's invariants against randomized
//! submit/save sequences, in the same `proptest!` style the pack's other
//! storage-engine test suites use for their transaction invariants.

use std::sync::Arc;

use proptest::prelude::*;

use doccoord_kv::ids::DocumentId;
use doccoord_kv::store::{CommitOutcome, MemoryStore, ReserveOutcome, Store};

#[derive(Debug, Clone)]
enum Action {
    Submit,
    Save,
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![8 => Just(Action::Submit), 2 => Just(Action::Save)]
}

/// Drives a random sequence of submits and saves against one document
/// through only the six KVC primitives (no pipeline retry logic), proving
/// the invariants of spec.md §3/§8 hold however the actions interleave.
fn run_sequence(actions: Vec<Action>) -> Result<(), TestCaseError> {
    let store = Arc::new(MemoryStore::new());
    let document = DocumentId::new();
    let mut committed_versions = Vec::new();

    for action in actions {
        match action {
            Action::Submit => {
                let reserved = match store.reserve(document, 0).unwrap() {
                    ReserveOutcome::StaleClient { .. } => continue,
                    ReserveOutcome::Reserved { new_version, .. } => new_version,
                };
                match store.commit(document, reserved, serde_json::json!({"v": reserved})).unwrap() {
                    CommitOutcome::Ok => committed_versions.push(reserved),
                    CommitOutcome::GapBefore | CommitOutcome::PendingBefore => {
                        store.abandon(document, reserved).unwrap();
                    }
                    CommitOutcome::VersionConflict => panic!("unexpected version conflict"),
                }
            }
            Action::Save => {
                let (_version, persisted) = store.versions(document).unwrap();
                let contiguous = store.get_pending(document, persisted).unwrap();
                if let Some(last) = contiguous.ops.last() {
                    store.save_cleanup(document, last.version).unwrap();
                }
            }
        }
    }

    // Gapless (invariant 1): every version still in `Ops(D)` between the
    // persisted tip and the version counter must be present.
    let (version, persisted) = store.versions(document).unwrap();
    prop_assert!(version >= persisted, "counter floor violated: V={version} P={persisted}");

    // Contiguity law: get-pending from the persisted tip always returns a
    // strictly increasing, gapless run of versions.
    let since = store.get_pending(document, persisted).unwrap();
    let mut expected = persisted + 1;
    for op in &since.ops {
        prop_assert_eq!(op.version, expected);
        expected += 1;
    }

    // save-cleanup is monotone: replaying every historically committed
    // version through get-pending never surfaces a version <= persisted.
    for v in &committed_versions {
        if *v <= persisted {
            prop_assert!(
                since.ops.iter().all(|op| op.version != *v),
                "pruned version {v} resurfaced after save-cleanup"
            );
        }
    }

    Ok(())
}

proptest! {
    #[test]
    fn random_submit_save_sequences_preserve_ledger_invariants(
        actions in prop::collection::vec(arb_action(), 1..200)
    ) {
        run_sequence(actions)?;
    }
}

#[test]
fn reserve_never_skips_or_repeats_a_version_under_heavy_interleaving() {
    let store = Arc::new(MemoryStore::new());
    let document = DocumentId::new();

    let mut versions = Vec::new();
    for _ in 0..64 {
        match store.reserve(document, 0).unwrap() {
            ReserveOutcome::Reserved { new_version, .. } => versions.push(new_version),
            _ => panic!(),
        }
    }
    let mut sorted = versions.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), versions.len(), "reserve produced a duplicate version");
    assert_eq!(sorted, (1..=64).collect::<Vec<_>>(), "reserve skipped a version");
}
