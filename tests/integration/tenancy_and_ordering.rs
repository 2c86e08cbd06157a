//! Tenancy, chunk-ordering, and dimension invariants (SPEC_FULL.md §8).

use retrieva::rag::search_index::IndexedChunk;
use retrieva::types::{Chunk, CoreError, Document, SourceType};
use uuid::Uuid;

use crate::common::fixtures::{seed_chunk, seed_document, seed_user_and_space, test_state};

/// Every hit returned for `(user_id, space_id)` carries back that exact tenant, never another
/// caller's (SPEC_FULL.md §8 "Tenancy").
#[tokio::test]
async fn hits_never_cross_tenant_boundaries() {
    let state = test_state().await;
    let (claims_a, space_a) = seed_user_and_space(&state, "tenant-a@example.com").await;
    let (claims_b, space_b) = seed_user_and_space(&state, "tenant-b@example.com").await;

    seed_document(
        &state,
        &claims_a.sub,
        &space_a,
        "a.txt",
        None,
        vec![seed_chunk("alpha bravo charlie", [1.0, 0.0, 0.0])],
    )
    .await;
    seed_document(
        &state,
        &claims_b.sub,
        &space_b,
        "b.txt",
        None,
        vec![seed_chunk("alpha bravo charlie", [1.0, 0.0, 0.0])],
    )
    .await;

    let hits_a = state
        .search_index
        .lexical_search(&claims_a.sub, &space_a, "alpha bravo", 10, None);
    assert_eq!(hits_a.len(), 1);
    for hit in &hits_a {
        assert_eq!(hit.user_id, claims_a.sub);
        assert_eq!(hit.space_id, space_a);
    }

    let hits_b = state
        .search_index
        .lexical_search(&claims_b.sub, &space_b, "alpha bravo", 10, None);
    assert_eq!(hits_b.len(), 1);
    assert_eq!(hits_b[0].user_id, claims_b.sub);
    assert_eq!(hits_b[0].space_id, space_b);

    // Cross-tenant query must not see the other tenant's chunk.
    let cross = state
        .search_index
        .lexical_search(&claims_a.sub, &space_b, "alpha bravo", 10, None);
    assert!(cross.is_empty());
}

/// `MetaStore::ingest_document` rejects any non-contiguous `chunk_index` sequence
/// (SPEC_FULL.md §8 "Chunk ordering").
#[tokio::test]
async fn non_contiguous_chunk_indexes_are_rejected() {
    let state = test_state().await;
    let (claims, space_id) = seed_user_and_space(&state, "ordering@example.com").await;

    let document = Document {
        id: Uuid::new_v4().to_string(),
        user_id: claims.sub.clone(),
        space_id: space_id.clone(),
        source_type: SourceType::Text,
        file_name: "gap.txt".to_string(),
        blob_url: None,
        metadata: Default::default(),
        created_at: chrono::Utc::now(),
    };
    let chunks = vec![
        Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            chunk_index: 0,
            content: "first".to_string(),
            embedding: None,
            char_count: 5,
            created_at: document.created_at,
        },
        Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            chunk_index: 2, // gap: should be 1
            content: "third".to_string(),
            embedding: None,
            char_count: 5,
            created_at: document.created_at,
        },
    ];

    let err = state.metastore.ingest_document(&document, &chunks, &[]).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    // And the rejected document must not have partially landed.
    let listed = state.metastore.list_documents(&claims.sub, &space_id).await.unwrap();
    assert!(listed.is_empty());
}

/// A contiguous sequence is accepted and preserves chunk order on read-back.
#[tokio::test]
async fn contiguous_chunk_indexes_round_trip_in_order() {
    let state = test_state().await;
    let (claims, space_id) = seed_user_and_space(&state, "contiguous@example.com").await;

    let document = seed_document(
        &state,
        &claims.sub,
        &space_id,
        "report.txt",
        None,
        vec![
            seed_chunk("first chunk", [1.0, 0.0, 0.0]),
            seed_chunk("second chunk", [0.0, 1.0, 0.0]),
            seed_chunk("third chunk", [0.0, 0.0, 1.0]),
        ],
    )
    .await;

    let chunks = state.metastore.list_chunks(&document.id).await.unwrap();
    assert_eq!(chunks.len(), 3);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index as usize, i);
    }
}

/// SearchIndex rejects a chunk batch whose embedding dimension doesn't match the index's
/// configured dimensionality (SPEC_FULL.md §8 "Dimension").
#[tokio::test]
async fn search_index_rejects_mismatched_embedding_dimension() {
    let state = test_state().await;
    let (claims, space_id) = seed_user_and_space(&state, "dimension@example.com").await;

    let bad_chunk = IndexedChunk {
        document_id: Uuid::new_v4().to_string(),
        chunk_index: 0,
        text: "wrong dimension".to_string(),
        file_name: "x.txt".to_string(),
        title: None,
        source_type: SourceType::Text,
        user_id: claims.sub.clone(),
        space_id: space_id.clone(),
        created_at: chrono::Utc::now(),
        embedding: vec![1.0, 0.0], // index was built for 3 dimensions
    };

    let err = state.search_index.bulk_index_chunks(&[bad_chunk]).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}
