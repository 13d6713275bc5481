//! Property-based tests for vector-index query invariants: threshold,
//! descending score order, dedup, and the token-budget cut.

use fleet_core::Identifier;
use fleet_index::{QueryFilter, VectorIndex};
use fleet_storage::NullStore;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

// ── Strategies ──────────────────────────────────────────────────────

fn arb_vector() -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0, 3)
}

fn arb_entries() -> impl Strategy<Value = Vec<(Vec<f32>, u32)>> {
    proptest::collection::vec((arb_vector(), 0u32..50), 1..12)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ── 1. Arbitrary stores + queries → threshold/order/dedup hold ──────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn results_meet_threshold_sorted_and_unique(
        entries in arb_entries(),
        query in arb_vector(),
        threshold in 0.0f64..1.0,
    ) {
        runtime().block_on(async {
            let idx = VectorIndex::new(Arc::new(NullStore::new()), "vectors");
            for (i, (vector, tokens)) in entries.iter().enumerate() {
                let id = Identifier::new("resource.Document", format!("d{i}")).with_tokens(*tokens);
                idx.add(id, vector.clone()).await.unwrap();
            }

            let results = idx.query_items(&[query.clone()], threshold, &QueryFilter::unlimited()).await;

            let mut seen = HashSet::new();
            let mut previous_score = f64::INFINITY;
            for result in &results {
                prop_assert!(result.score >= threshold);
                prop_assert!(result.score <= previous_score);
                previous_score = result.score;
                prop_assert!(seen.insert(result.identifier.to_canonical()));
            }
            Ok(())
        })?;
    }

    #[test]
    fn max_tokens_cut_never_exceeds_budget(
        entries in arb_entries(),
        query in arb_vector(),
        max_tokens in 0u32..100,
    ) {
        runtime().block_on(async {
            let idx = VectorIndex::new(Arc::new(NullStore::new()), "vectors");
            let mut tokens_by_id = std::collections::HashMap::new();
            for (i, (vector, tokens)) in entries.iter().enumerate() {
                let id = Identifier::new("resource.Document", format!("d{i}")).with_tokens(*tokens);
                tokens_by_id.insert(id.to_canonical(), *tokens);
                idx.add(id, vector.clone()).await.unwrap();
            }

            let filter = QueryFilter::unlimited().with_max_tokens(max_tokens);
            let results = idx.query_items(&[query.clone()], -1.0, &filter).await;

            let total: u32 = results
                .iter()
                .map(|r| tokens_by_id[&r.identifier.to_canonical()])
                .sum();
            prop_assert!(total <= max_tokens);
            Ok(())
        })?;
    }
}
