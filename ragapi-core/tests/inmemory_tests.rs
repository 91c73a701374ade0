//! Property tests for in-memory vector store search ordering.

use std::sync::Arc;

use proptest::prelude::*;
use ragapi_core::{ErrorKind, InMemoryVectorStore, SimilarityMetric, VectorStore};

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-6 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate `(content, embedding, tag)` with a tag drawn from a small set.
fn arb_entry(dim: usize) -> impl Strategy<Value = (String, Vec<f32>, String)> {
    ("[a-z ]{5,30}", arb_normalized_embedding(dim), prop::sample::select(vec!["a", "b", "c"]))
        .prop_map(|(text, embedding, tag)| (text, embedding, tag.to_string()))
}

fn arb_metric() -> impl Strategy<Value = SimilarityMetric> {
    prop_oneof![
        Just(SimilarityMetric::Cosine),
        Just(SimilarityMetric::Euclidean),
        Just(SimilarityMetric::InnerProduct),
    ]
}

/// For any stored set, a search returns at most `k` results of dimension `D`,
/// ordered by descending score, all carrying the requested tag.
mod prop_inmemory_search {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_are_ordered_bounded_and_filtered(
            entries in proptest::collection::vec(arb_entry(DIM), 0..20),
            query in arb_normalized_embedding(DIM),
            k in 0usize..25,
            tag in prop::option::of(prop::sample::select(vec!["a", "b", "c", "missing"])),
            metric in arb_metric(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::with_metric(DIM, metric);
                for (text, embedding, tag) in &entries {
                    store.insert(text, embedding, tag).await.unwrap();
                }
                store.search(&query, tag, k).await.unwrap()
            });

            let qualifying = entries
                .iter()
                .filter(|(_, _, t)| tag.is_none_or(|wanted| t == wanted))
                .count();

            prop_assert_eq!(results.len(), k.min(qualifying));
            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
            for result in &results {
                prop_assert_eq!(result.document.embedding.len(), DIM);
                if let Some(wanted) = tag {
                    prop_assert_eq!(result.document.source_tag.as_str(), wanted);
                }
            }
        }

        #[test]
        fn stored_vector_is_its_own_nearest_neighbour(
            entries in proptest::collection::vec(arb_entry(DIM), 1..10),
            pick in any::<prop::sample::Index>(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (target, results) = rt.block_on(async {
                let store = InMemoryVectorStore::new(DIM);
                let mut ids = Vec::new();
                for (text, embedding, tag) in &entries {
                    ids.push(store.insert(text, embedding, tag).await.unwrap());
                }
                let i = pick.index(entries.len());
                let results = store.search(&entries[i].1, None, 1).await.unwrap();
                ((ids[i], entries[i].1.clone()), results)
            });

            prop_assert_eq!(results.len(), 1);
            // Another entry may share the same direction; the score must still be maximal.
            prop_assert!((results[0].score - 1.0).abs() < 1e-4);
            if results[0].document.id != target.0 {
                prop_assert!(SimilarityMetric::Cosine.score(&results[0].document.embedding, &target.1) > 0.9999);
            }
        }
    }
}

#[tokio::test]
async fn wrong_dimension_insert_fails_and_writes_nothing() {
    let store = InMemoryVectorStore::new(4);
    store.insert("ok", &[1.0, 0.0, 0.0, 0.0], "t").await.unwrap();

    let err = store.insert("bad", &[1.0, 0.0, 0.0], "t").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn wrong_dimension_search_fails() {
    let store = InMemoryVectorStore::new(4);
    let err = store.search(&[1.0; 5], None, 3).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
}

#[tokio::test]
async fn empty_store_and_zero_k_return_nothing() {
    let store = InMemoryVectorStore::new(2);
    assert!(store.search(&[1.0, 0.0], None, 5).await.unwrap().is_empty());

    store.insert("x", &[1.0, 0.0], "t").await.unwrap();
    assert!(store.search(&[1.0, 0.0], None, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn fewer_than_k_documents_returns_all() {
    let store = InMemoryVectorStore::new(2);
    store.insert("x", &[1.0, 0.0], "t").await.unwrap();
    store.insert("y", &[0.0, 1.0], "t").await.unwrap();

    let results = store.search(&[1.0, 0.0], Some("t"), 10).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].document.content, "x");
    assert_eq!(results[1].document.content, "y");
}

#[tokio::test]
async fn equal_scores_keep_insertion_order() {
    let store = InMemoryVectorStore::new(2);
    let first = store.insert("first", &[1.0, 0.0], "t").await.unwrap();
    let second = store.insert("second", &[1.0, 0.0], "t").await.unwrap();

    let results = store.search(&[1.0, 0.0], None, 2).await.unwrap();
    assert_eq!(results[0].document.id, first);
    assert_eq!(results[1].document.id, second);
}

#[tokio::test]
async fn euclidean_scores_are_inverse_distance() {
    let store = InMemoryVectorStore::with_metric(2, SimilarityMetric::Euclidean);
    store.insert("near", &[3.0, 4.0], "t").await.unwrap();
    store.insert("origin", &[0.0, 0.0], "t").await.unwrap();

    let results = store.search(&[3.0, 4.0], None, 2).await.unwrap();
    assert_eq!(results[0].document.content, "near");
    assert!((results[0].score - 1.0).abs() < 1e-6);
    // distance 5 -> 1 / 6
    assert!((results[1].score - 1.0 / 6.0).abs() < 1e-6);
    assert_eq!(store.metric(), SimilarityMetric::Euclidean);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_are_all_kept_with_distinct_ids() {
    let store = Arc::new(InMemoryVectorStore::new(3));
    let mut handles = Vec::new();
    for i in 0..50 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.insert(&format!("doc {i}"), &[i as f32, 1.0, 0.0], "t").await
        }));
    }

    let mut ids = std::collections::HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap().unwrap());
    }
    assert_eq!(ids.len(), 50);
    assert_eq!(store.count().await.unwrap(), 50);
}
