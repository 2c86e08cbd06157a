//! Deep Research handlers (SPEC_FULL.md §4.K, §6).

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::research::deep_research::ResearchAnswer;
use crate::types::{Reference, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub space_id: String,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub conversation_id: String,
}

/// `POST /deep-research/start`: allocates a fresh, empty conversation.
pub async fn start(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>> {
    let conversation_id = state.deep_research.start(&claims.sub, &req.space_id).await?;
    Ok(Json(StartResponse { conversation_id }))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub conversation_id: String,
    pub message: String,
    pub space_id: String,
    /// Accepted for forward compatibility with a future multi-provider selector; the core always
    /// resolves the Generator through `ConfigBasedLLMFactory`'s default model (SPEC_FULL.md §4.M).
    #[serde(default)]
    pub llm_provider: Option<String>,
    #[serde(default)]
    pub force_web: bool,
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub confidence: f32,
    pub web_attempted: bool,
    pub elapsed_seconds: f64,
    pub references: Vec<Reference>,
    pub followup_questions: Vec<String>,
}

impl From<ResearchAnswer> for AskResponse {
    fn from(a: ResearchAnswer) -> Self {
        Self {
            answer: a.answer,
            confidence: a.confidence,
            web_attempted: a.web_attempted,
            elapsed_seconds: a.elapsed_seconds,
            references: a.references,
            followup_questions: a.followup_questions,
        }
    }
}

/// `POST /deep-research/ask`: runs one agentic loop under the wall-clock budget `T_total`.
pub async fn ask(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>> {
    let answer = state
        .deep_research
        .ask(&claims.sub, &req.space_id, &req.conversation_id, &req.message, req.force_web, &req.urls)
        .await?;
    Ok(Json(answer.into()))
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
    use crate::tools::websearch::NoneWebSearch;
    use crate::types::Claims;
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
            Arc::new(LocalBlobStore::new(std::env::temp_dir().join("ares-research-test-blobs")));
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

    async fn seed_user_and_space(state: &AppState) -> (Claims, String) {
        let user = state.metastore.create_user("research-test@example.com").await.unwrap();
        let spaces = state.metastore.list_spaces(&user.id).await.unwrap();
        let claims = Claims { sub: user.id, email: user.email, exp: 0, iat: 0 };
        (claims, spaces[0].id.clone())
    }

    #[tokio::test]
    async fn start_allocates_a_fresh_conversation() {
        let state = test_state().await;
        let (claims, space_id) = seed_user_and_space(&state).await;
        let resp = start(State(state), AuthUser(claims), Json(StartRequest { space_id })).await.unwrap();
        assert!(!resp.0.conversation_id.is_empty());
    }

    #[tokio::test]
    async fn start_rejects_unknown_space() {
        let state = test_state().await;
        let (claims, _) = seed_user_and_space(&state).await;
        let err = start(
            State(state),
            AuthUser(claims),
            Json(StartRequest { space_id: "nope".into() }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn ask_answers_with_no_local_documents_indexed() {
        let state = test_state().await;
        let (claims, space_id) = seed_user_and_space(&state).await;
        let conversation_id = start(
            State(state.clone()),
            AuthUser(claims.clone()),
            Json(StartRequest { space_id: space_id.clone() }),
        )
        .await
        .unwrap()
        .0
        .conversation_id;

        let resp = ask(
            State(state),
            AuthUser(claims),
            Json(AskRequest {
                conversation_id,
                message: "what is the capital of France?".into(),
                space_id,
                llm_provider: None,
                force_web: false,
                urls: vec![],
            }),
        )
        .await
        .unwrap();

        assert!(!resp.0.answer.is_empty());
        assert!(!resp.0.web_attempted);
    }
}
