//! RRF determinism (SPEC_FULL.md §8) at the public `Retriever` API.
//!
//! `fuse_rrf`/`aggregate_best_per_document` are private to `retriever.rs` and already covered by
//! its own `#[cfg(test)]` unit tests (including the exact worked k0=60 example). What those
//! unit tests cannot exercise is the end-to-end guarantee that repeated calls through the public
//! `hybrid()` API return the same ranked order — this is what's verified here, accepting the
//! real `fastembed` call `hybrid()` makes internally (no way to avoid it through the public API,
//! same as the existing precedent in `src/api/handlers/research.rs`'s handler tests).

use retrieva::rag::retriever::RetrieveFilters;

use crate::common::fixtures::{seed_chunk, seed_document, seed_user_and_space, test_state};

#[tokio::test]
async fn hybrid_retrieval_returns_the_same_order_on_repeated_calls() {
    let state = test_state().await;
    let (claims, space_id) = seed_user_and_space(&state, "rrf-determinism@example.com").await;

    seed_document(
        &state,
        &claims.sub,
        &space_id,
        "alpha.txt",
        None,
        vec![seed_chunk("the quarterly revenue report shows growth", [1.0, 0.0, 0.0])],
    )
    .await;
    seed_document(
        &state,
        &claims.sub,
        &space_id,
        "beta.txt",
        None,
        vec![seed_chunk("revenue figures for the quarterly report", [0.0, 1.0, 0.0])],
    )
    .await;
    seed_document(
        &state,
        &claims.sub,
        &space_id,
        "gamma.txt",
        None,
        vec![seed_chunk("an unrelated memo about office supplies", [0.0, 0.0, 1.0])],
    )
    .await;

    let filters = RetrieveFilters::default();
    let first = state
        .retriever
        .hybrid(&claims.sub, &space_id, "quarterly revenue report", Some(10), &filters)
        .await
        .unwrap();
    let second = state
        .retriever
        .hybrid(&claims.sub, &space_id, "quarterly revenue report", Some(10), &filters)
        .await
        .unwrap();

    assert!(!first.is_empty());
    let first_order: Vec<&str> = first.iter().map(|h| h.document_id.as_str()).collect();
    let second_order: Vec<&str> = second.iter().map(|h| h.document_id.as_str()).collect();
    assert_eq!(first_order, second_order);
}

/// A fresh tenant with no indexed documents returns an empty hybrid result rather than erroring,
/// so Deep Research's unconditional `local_retrieve` call always has something to evaluate.
#[tokio::test]
async fn hybrid_retrieval_on_empty_tenant_is_empty_not_an_error() {
    let state = test_state().await;
    let (claims, space_id) = seed_user_and_space(&state, "empty-tenant@example.com").await;

    let hits = state
        .retriever
        .hybrid(&claims.sub, &space_id, "anything at all", Some(10), &RetrieveFilters::default())
        .await
        .unwrap();
    assert!(hits.is_empty());
}
