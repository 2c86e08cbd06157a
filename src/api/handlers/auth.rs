//! Token issuance (SPEC_FULL.md §1, §10).
//!
//! Registration, password policy, and session storage are carried over from the host
//! application's existing auth stack unmodified; this core only mints and refreshes the claims
//! it consumes everywhere else, bridging a caller-supplied email into a signed token pair.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::types::{Result, TokenResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Mints a token pair for `email`, creating the user (and its default space) on first use.
pub async fn token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>> {
    let user = match state.metastore.get_user_by_email(&req.email).await? {
        Some(user) => user,
        None => state.metastore.create_user(&req.email).await?,
    };
    state.metastore.touch_last_login(&user.id).await?;
    let tokens = state.auth_service.generate_tokens(&user.id, &user.email)?;
    Ok(Json(tokens))
}

/// Mints a fresh pair from a still-valid refresh token.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>> {
    let claims = state.auth_service.verify_token(&req.refresh_token)?;
    let tokens = state.auth_service.generate_tokens(&claims.sub, &claims.email)?;
    Ok(Json(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::AuthService;
    use crate::db::ares_vector::AresVectorStore;
    use crate::db::metastore::MetaStore;
    use crate::db::VectorStore;
    use crate::ingest::blob_store::{BlobStore, LocalBlobStore};
    use crate::ingest::extract::Extractor;
    use crate::ingest::Ingestor;
    use crate::rag::cache::{Cache, CacheConfig};
    use crate::rag::chunker::TextChunker;
    use crate::rag::embeddings::{EmbeddingConfig, EmbeddingService};
    use crate::rag::retriever::{Retriever, RetrieverConfig};
    use crate::rag::search_index::SearchIndex;
    use crate::rag::synthesizer::Synthesizer;
    use crate::research::deep_research::DeepResearchAgent;
    use crate::tools::websearch::NoneWebSearch;
    use crate::utils::toml_config::{AresConfig, AresConfigManager};
    use std::sync::Arc;

    async fn test_state() -> AppState {
        let metastore = Arc::new(MetaStore::open_local(":memory:").await.unwrap());
        metastore.init_schema().await.unwrap();
        let vector_store: Arc<dyn VectorStore> = Arc::new(AresVectorStore::open(None).await.unwrap());
        let search_index = Arc::new(SearchIndex::new(vector_store, 384, 768));
        let cache = Arc::new(Cache::new(CacheConfig::default()));
        let embeddings = Arc::new(EmbeddingService::new(EmbeddingConfig::default()));
        let blob_store: Arc<dyn BlobStore> =
            Arc::new(LocalBlobStore::new(std::env::temp_dir().join("ares-auth-test-blobs")));
        let ingestor = Arc::new(Ingestor::new(
            Arc::clone(&blob_store),
            Extractor::new(),
            TextChunker::default(),
            Arc::clone(&embeddings),
            Arc::clone(&metastore),
            Arc::clone(&search_index),
            Arc::clone(&cache),
        ));
        let retriever = Arc::new(Retriever::new(
            Arc::clone(&search_index),
            Arc::clone(&cache),
            Arc::clone(&embeddings),
            RetrieverConfig::default(),
        ));
        let generator: Arc<dyn crate::LLMClient> =
            Arc::new(crate::llm::test_support::MockLLMClient::default());
        let synthesizer = Arc::new(Synthesizer::new(
            Arc::clone(&generator),
            Arc::clone(&cache),
            Default::default(),
        ));
        let deep_research = Arc::new(DeepResearchAgent::new(
            Arc::clone(&generator),
            Arc::clone(&retriever),
            Arc::new(NoneWebSearch),
            Arc::clone(&metastore),
            Arc::clone(&cache),
            Default::default(),
        ));
        let config_manager = Arc::new(AresConfigManager::from_config(AresConfig {
            server: Default::default(),
            auth: Default::default(),
            database: Default::default(),
            providers: Default::default(),
            models: Default::default(),
            rag: Default::default(),
            retrieval: Default::default(),
            cache: Default::default(),
            deep_research: Default::default(),
            web: Default::default(),
            ranking: Default::default(),
            blob_store: Default::default(),
        }));
        let llm_factory = Arc::new(
            crate::ConfigBasedLLMFactory::new(Arc::new(crate::ProviderRegistry::new()), "default"),
        );
        AppState {
            config_manager,
            metastore,
            search_index,
            cache,
            embeddings,
            blob_store,
            ingestor,
            retriever,
            synthesizer,
            deep_research,
            llm_factory,
            auth_service: Arc::new(AuthService::new("test-secret-at-least-32-chars!!".into(), 900, 604800)),
        }
    }

    #[tokio::test]
    async fn token_creates_user_on_first_call() {
        let state = test_state().await;
        let resp = token(
            State(state.clone()),
            Json(TokenRequest { email: "new@example.com".into() }),
        )
        .await
        .unwrap();
        assert!(!resp.0.access_token.is_empty());
        assert!(state.metastore.get_user_by_email("new@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn refresh_mints_a_fresh_pair() {
        let state = test_state().await;
        let first = token(State(state.clone()), Json(TokenRequest { email: "u@example.com".into() }))
            .await
            .unwrap();
        let second = refresh(
            State(state),
            Json(RefreshRequest { refresh_token: first.0.refresh_token.clone() }),
        )
        .await
        .unwrap();
        assert!(!second.0.access_token.is_empty());
    }
}
