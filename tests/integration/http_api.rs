//! Full-router HTTP tests (SPEC_FULL.md §6) via `axum-test`, covering the auth token flow, the
//! bearer-token requirement on protected routes, and tenant isolation observed through HTTP.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderValue;
use axum_test::TestServer;
use serde_json::json;

use crate::common::fixtures::{build_router, seed_chunk, seed_document, seed_user_and_space, test_state};

#[tokio::test]
async fn token_then_refresh_issues_a_working_bearer_token() {
    let state = test_state().await;
    let server = TestServer::new(build_router(state)).unwrap();

    let token_resp = server.post("/auth/token").json(&json!({"email": "http-user@example.com"})).await;
    token_resp.assert_status_ok();
    let tokens: serde_json::Value = token_resp.json();
    assert!(tokens["access_token"].as_str().is_some());
    assert!(tokens["refresh_token"].as_str().is_some());

    let refresh_resp = server
        .post("/auth/refresh")
        .json(&json!({"refresh_token": tokens["refresh_token"].as_str().unwrap()}))
        .await;
    refresh_resp.assert_status_ok();
    let refreshed: serde_json::Value = refresh_resp.json();
    assert!(refreshed["access_token"].as_str().is_some());
}

#[tokio::test]
async fn protected_route_without_bearer_token_is_unauthorized() {
    let state = test_state().await;
    let server = TestServer::new(build_router(state)).unwrap();

    let resp = server
        .post("/search")
        .json(&json!({"query": "anything", "space_id": "whatever"}))
        .await;
    resp.assert_status_unauthorized();
}

#[tokio::test]
async fn admin_documents_only_lists_the_caller_own_tenant() {
    let state = test_state().await;
    let server = TestServer::new(build_router(state.clone())).unwrap();

    let token_a = server.post("/auth/token").json(&json!({"email": "http-tenant-a@example.com"})).await;
    let access_a = token_a.json::<serde_json::Value>()["access_token"].as_str().unwrap().to_string();
    let token_b = server.post("/auth/token").json(&json!({"email": "http-tenant-b@example.com"})).await;
    let access_b = token_b.json::<serde_json::Value>()["access_token"].as_str().unwrap().to_string();

    let spaces_a = state.metastore.list_spaces(&state.auth_service.verify_token(&access_a).unwrap().sub).await.unwrap();
    seed_document(
        &state,
        &state.auth_service.verify_token(&access_a).unwrap().sub,
        &spaces_a[0].id,
        "a-only.txt",
        None,
        vec![seed_chunk("tenant a document", [1.0, 0.0, 0.0])],
    )
    .await;

    let listed_a = server
        .get("/admin/documents")
        .add_header(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {access_a}")).unwrap())
        .await;
    listed_a.assert_status_ok();
    let body_a: serde_json::Value = listed_a.json();
    assert_eq!(body_a["total"].as_u64().unwrap(), 1);

    let listed_b = server
        .get("/admin/documents")
        .add_header(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {access_b}")).unwrap())
        .await;
    listed_b.assert_status_ok();
    let body_b: serde_json::Value = listed_b.json();
    assert_eq!(body_b["total"].as_u64().unwrap(), 0, "tenant B must not see tenant A's documents");
}

#[tokio::test]
async fn search_over_http_returns_seeded_hits() {
    let state = test_state().await;
    let (claims, space_id) = seed_user_and_space(&state, "http-search@example.com").await;
    seed_document(
        &state,
        &claims.sub,
        &space_id,
        "handbook.txt",
        None,
        vec![seed_chunk("employee handbook onboarding steps", [1.0, 0.0, 0.0])],
    )
    .await;

    let access_token = state.auth_service.generate_tokens(&claims.sub, &claims.email).unwrap().access_token;
    let server = TestServer::new(build_router(state)).unwrap();

    let resp = server
        .post("/search")
        .add_header(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {access_token}")).unwrap())
        .json(&json!({"query": "onboarding steps", "mode": "fulltext", "space_id": space_id}))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert!(body["hits"].as_array().unwrap().len() >= 1);
}
