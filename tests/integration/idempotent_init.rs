//! "Idempotent init" (SPEC_FULL.md §8): re-running schema/index setup against state that already
//! holds documents must not lose or duplicate anything.

use retrieva::db::metastore::MetaStore;

use crate::common::fixtures::{seed_chunk, seed_document, seed_user_and_space, test_state};

#[tokio::test]
async fn reinitializing_the_metastore_schema_preserves_existing_documents() {
    let state = test_state().await;
    let (claims, space_id) = seed_user_and_space(&state, "reinit-metastore@example.com").await;
    let document = seed_document(
        &state,
        &claims.sub,
        &space_id,
        "first.txt",
        None,
        vec![seed_chunk("a document that predates the second schema init call", [1.0, 0.0, 0.0])],
    )
    .await;

    state.metastore.init_schema().await.unwrap();
    state.metastore.init_schema().await.unwrap();

    let fetched = state.metastore.get_document(&claims.sub, &space_id, &document.id).await.unwrap();
    assert_eq!(fetched.id, document.id);
    let listed = state.metastore.list_documents(&claims.sub, &space_id).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn a_second_metastore_handle_over_the_same_path_sees_the_schema_and_data() {
    let path = std::env::temp_dir().join(format!("retrieva-idempotent-init-{}.db", uuid::Uuid::new_v4()));
    let path_str = path.to_str().unwrap().to_string();

    let first = MetaStore::open_local(&path_str).await.unwrap();
    first.init_schema().await.unwrap();
    let user = first.create_user("reopen@example.com").await.unwrap();
    let spaces = first.list_spaces(&user.id).await.unwrap();
    drop(first);

    let second = MetaStore::open_local(&path_str).await.unwrap();
    second.init_schema().await.unwrap();
    let reopened_spaces = second.list_spaces(&user.id).await.unwrap();
    assert_eq!(reopened_spaces.len(), spaces.len());
    assert_eq!(reopened_spaces[0].id, spaces[0].id);

    let _ = std::fs::remove_file(&path_str);
}

/// Re-running `ensure_indexes` for a tenant that already has indexed chunks must not clear or
/// duplicate its lexical/KNN-searchable state.
#[tokio::test]
async fn reensuring_search_indexes_preserves_existing_hits() {
    let state = test_state().await;
    let (claims, space_id) = seed_user_and_space(&state, "reinit-searchindex@example.com").await;
    let embedding = [0.0_f32, 0.0, 1.0];
    seed_document(
        &state,
        &claims.sub,
        &space_id,
        "preexisting.txt",
        None,
        vec![seed_chunk("content indexed before the repeated ensure_indexes call", embedding)],
    )
    .await;

    state.search_index.ensure_indexes(&claims.sub, &space_id).await.unwrap();
    state.search_index.ensure_indexes(&claims.sub, &space_id).await.unwrap();

    let lexical_hits = state.search_index.lexical_search(&claims.sub, &space_id, "indexed", 10, None);
    assert_eq!(lexical_hits.len(), 1);

    let knn_hits = state.search_index.knn_search(&claims.sub, &space_id, &embedding, 10, None).await.unwrap();
    assert_eq!(knn_hits.len(), 1);
}
