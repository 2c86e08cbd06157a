//! Route table (SPEC_FULL.md §6).

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::auth::jwt::AuthService;
use crate::AppState;

/// Builds the full router. `auth_service` is layered onto the protected group via
/// [`crate::auth::middleware::auth_middleware`] so the `AuthUser` extractor sees populated claims.
pub fn create_router(auth_service: Arc<AuthService>) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/auth/token", post(crate::api::handlers::auth::token))
        .route("/auth/refresh", post(crate::api::handlers::auth::refresh));

    let protected_routes = Router::new()
        .route("/upload", post(crate::api::handlers::rag::upload))
        .route("/search", post(crate::api::handlers::rag::search))
        .route("/image-search", post(crate::api::handlers::rag::image_search))
        .route("/deep-research/start", post(crate::api::handlers::research::start))
        .route("/deep-research/ask", post(crate::api::handlers::research::ask))
        .route(
            "/admin/documents",
            get(crate::api::handlers::rag::list_documents),
        )
        .route(
            "/admin/documents/{id}",
            delete(crate::api::handlers::rag::delete_document),
        )
        .route("/admin/reindex", post(crate::api::handlers::rag::reindex))
        .layer(middleware::from_fn_with_state(auth_service, crate::auth::middleware::auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
