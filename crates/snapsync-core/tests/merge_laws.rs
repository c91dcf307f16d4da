//! Property-based tests for the merge laws.
//!
//! 1. Replaying unique `(source, sequence)` edits yields the empty document
//!    with each patch applied in submission order.
//! 2. Re-submitting an already accepted identity changes nothing, whatever
//!    its data.

use proptest::prelude::*;
use serde_json::Value;
use snapsync_core::{patch, FailedPatchPolicy, MergeOutcome, Replica, Transaction};
use std::collections::HashMap;
use std::sync::Arc;

// =============================================================================
// STRATEGIES
// =============================================================================

fn source_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("a".to_string()), Just("b".to_string()), Just("c".to_string())]
}

fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-e]").expect("valid regex")
}

/// A single-operation patch. Some of these fail against a given snapshot
/// (removing or replacing a missing key), which the laws must tolerate.
fn patch_strategy() -> impl Strategy<Value = String> {
    (0u8..4, key_strategy(), any::<i32>()).prop_map(|(op, key, value)| match op {
        0 => format!(r#"[{{"op":"add","path":"/{key}","value":{value}}}]"#),
        1 => format!(r#"[{{"op":"replace","path":"/{key}","value":{value}}}]"#),
        2 => format!(r#"[{{"op":"remove","path":"/{key}"}}]"#),
        _ => format!(r#"[{{"op":"test","path":"/{key}","value":{value}}}]"#),
    })
}

/// Edits stamped with per-source sequence numbers 1, 2, ... in order.
fn edits_strategy() -> impl Strategy<Value = Vec<Transaction>> {
    prop::collection::vec((source_strategy(), patch_strategy()), 0..40).prop_map(|raw| {
        let mut next: HashMap<String, u64> = HashMap::new();
        raw.into_iter()
            .map(|(source, data)| {
                let seq = next.entry(source.clone()).or_insert(0);
                *seq += 1;
                Transaction::new(data, source, *seq)
            })
            .collect()
    })
}

fn fold(edits: &[Transaction]) -> Value {
    edits.iter().fold(patch::empty_document(), |doc, tx| {
        patch::apply(&doc, tx.data()).unwrap_or(doc)
    })
}

// =============================================================================
// LAWS
// =============================================================================

proptest! {
    #[test]
    fn replay_matches_sequential_application(edits in edits_strategy()) {
        let mut replica = Replica::new(FailedPatchPolicy::Retain);
        for tx in &edits {
            replica.merge(Arc::new(tx.clone()));
        }
        prop_assert_eq!(replica.snapshot(), &fold(&edits));

        let stats = replica.stats();
        prop_assert_eq!(stats.applied + stats.rejected, edits.len() as u64);
        prop_assert_eq!(stats.duplicates, 0);
        prop_assert_eq!(replica.log().len() as u64, stats.applied);
    }

    #[test]
    fn resubmission_changes_nothing(
        edits in edits_strategy(),
        pick in any::<prop::sample::Index>(),
        data in patch_strategy(),
    ) {
        let mut replica = Replica::new(FailedPatchPolicy::Retain);
        for tx in &edits {
            replica.merge(Arc::new(tx.clone()));
        }
        let accepted = replica.log().replay();
        prop_assume!(!accepted.is_empty());

        let original = &accepted[pick.index(accepted.len())];
        let before = (
            replica.snapshot().clone(),
            replica.log().len(),
            replica.clock().clone(),
        );

        let outcome = replica.merge(Arc::new(Transaction::new(
            data,
            original.source(),
            original.sequence(),
        )));
        prop_assert!(matches!(outcome, MergeOutcome::Duplicate));
        prop_assert_eq!(replica.snapshot(), &before.0);
        prop_assert_eq!(replica.log().len(), before.1);
        prop_assert_eq!(replica.clock(), &before.2);
    }

    #[test]
    fn clock_tracks_highest_accepted_sequence(edits in edits_strategy()) {
        let mut replica = Replica::new(FailedPatchPolicy::Consume);
        for tx in &edits {
            replica.merge(Arc::new(tx.clone()));
        }
        for tx in &edits {
            prop_assert!(replica.clock().get(tx.source()) >= tx.sequence());
        }
    }
}
