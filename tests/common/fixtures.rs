//! Shared `AppState` construction and tenant/document seeding helpers for the integration suite.
//!
//! Mirrors the `test_state()` helper duplicated in `src/api/handlers/{auth,rag,research}.rs`,
//! but builds the LLM client from [`crate::mocks::ScriptedLLMClient`] instead of the library's
//! own `llm::test_support::MockLLMClient`, which is `#[cfg(test)]`-gated to the library's own
//! unit test compilation and invisible from here.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use retrieva::api::routes::create_router;
use retrieva::auth::jwt::AuthService;
use retrieva::db::metastore::MetaStore;
use retrieva::db::vectorstore::InMemoryVectorStore;
use retrieva::db::VectorStore;
use retrieva::ingest::blob_store::{BlobStore, LocalBlobStore};
use retrieva::ingest::extract::Extractor;
use retrieva::ingest::Ingestor;
use retrieva::rag::cache::{Cache, CacheConfig};
use retrieva::rag::chunker::TextChunker;
use retrieva::rag::embeddings::{EmbeddingConfig, EmbeddingService};
use retrieva::rag::retriever::{Retriever, RetrieverConfig};
use retrieva::rag::search_index::{IndexedChunk, SearchIndex};
use retrieva::rag::synthesizer::Synthesizer;
use retrieva::research::deep_research::DeepResearchAgent;
use retrieva::tools::websearch::NoneWebSearch;
use retrieva::types::{Chunk, Claims, Document, SourceType};
use retrieva::utils::toml_config::{AresConfig, AresConfigManager};
use retrieva::{AppState, ConfigBasedLLMFactory, LLMClient, ProviderRegistry};

use crate::mocks::ScriptedLLMClient;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes!!";

/// Builds a full `AppState` over an in-memory MetaStore and vector store, with a scripted LLM
/// and no web search backend. `generator` lets a scenario swap in a different LLM double
/// (failing, delayed) without rebuilding the rest of the state.
pub async fn test_state_with_llm(generator: Arc<dyn LLMClient>) -> AppState {
    test_state_with(generator, Arc::new(NoneWebSearch)).await
}

pub async fn test_state() -> AppState {
    test_state_with_llm(Arc::new(ScriptedLLMClient::default())).await
}

/// Full control over both swappable collaborators, for scenarios exercising Deep Research's
/// web-search branch or a stalled vector store.
pub async fn test_state_with(
    generator: Arc<dyn LLMClient>,
    web_search: Arc<dyn retrieva::tools::websearch::WebSearch>,
) -> AppState {
    test_state_with_vector_store(generator, web_search, Arc::new(InMemoryVectorStore::new())).await
}

pub async fn test_state_with_vector_store(
    generator: Arc<dyn LLMClient>,
    web_search: Arc<dyn retrieva::tools::websearch::WebSearch>,
    vector_store: Arc<dyn VectorStore>,
) -> AppState {
    test_state_with_deep_research_config(
        generator,
        web_search,
        vector_store,
        retrieva::utils::toml_config::DeepResearchConfig::default(),
    )
    .await
}

/// Full control over the Deep Research budget/thresholds, for scenarios exercising
/// `t_total_seconds` or coverage thresholds directly.
pub async fn test_state_with_deep_research_config(
    generator: Arc<dyn LLMClient>,
    web_search: Arc<dyn retrieva::tools::websearch::WebSearch>,
    vector_store: Arc<dyn VectorStore>,
    deep_research_config: retrieva::utils::toml_config::DeepResearchConfig,
) -> AppState {
    let metastore = Arc::new(MetaStore::open_local(":memory:").await.unwrap());
    metastore.init_schema().await.unwrap();
    let search_index = Arc::new(SearchIndex::new(vector_store, 3, 3));
    let cache = Arc::new(Cache::new(CacheConfig::default()));
    let embeddings = Arc::new(EmbeddingService::new(EmbeddingConfig::default()));
    let blob_store: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        std::env::temp_dir().join(format!("retrieva-integration-test-blobs-{}", Uuid::new_v4())),
    ));
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
    let synthesizer = Arc::new(Synthesizer::new(
        Arc::clone(&generator),
        Arc::clone(&cache),
        Default::default(),
    ));
    let deep_research = Arc::new(DeepResearchAgent::new(
        Arc::clone(&generator),
        Arc::clone(&retriever),
        web_search,
        Arc::clone(&metastore),
        Arc::clone(&cache),
        deep_research_config,
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
    let llm_factory = Arc::new(ConfigBasedLLMFactory::new(Arc::new(ProviderRegistry::new()), "default"));
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
        auth_service: Arc::new(AuthService::new(JWT_SECRET.to_string(), 900, 604_800)),
    }
}

/// Builds the full HTTP router bound to `state`, ready for `axum_test::TestServer::new`.
pub fn build_router(state: AppState) -> axum::Router {
    create_router(Arc::clone(&state.auth_service)).with_state(state)
}

/// Creates a user plus its default space, returning claims usable directly with handler
/// functions or signed into a bearer token via `state.auth_service`.
pub async fn seed_user_and_space(state: &AppState, email: &str) -> (Claims, String) {
    let user = state.metastore.create_user(email).await.unwrap();
    let spaces = state.metastore.list_spaces(&user.id).await.unwrap();
    let claims = Claims { sub: user.id, email: user.email, exp: 0, iat: 0 };
    (claims, spaces[0].id.clone())
}

/// One chunk's worth of seed data: text plus a literal 3-dimensional embedding so tests never
/// need a real fastembed call to populate the index.
pub struct SeedChunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

pub fn seed_chunk(text: &str, embedding: [f32; 3]) -> SeedChunk {
    SeedChunk { text: text.to_string(), embedding: embedding.to_vec() }
}

/// Writes one document plus its chunks to both MetaStore (authoritative) and SearchIndex
/// (derived), bypassing `Ingestor`/`EmbeddingService` entirely. Returns the created document.
pub async fn seed_document(
    state: &AppState,
    user_id: &str,
    space_id: &str,
    file_name: &str,
    title: Option<&str>,
    chunks: Vec<SeedChunk>,
) -> Document {
    let document = Document {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        space_id: space_id.to_string(),
        source_type: SourceType::from_file_name(file_name).unwrap_or(SourceType::Text),
        file_name: file_name.to_string(),
        blob_url: None,
        metadata: title
            .map(|t| {
                let mut m = std::collections::HashMap::new();
                m.insert("title".to_string(), serde_json::Value::String(t.to_string()));
                m
            })
            .unwrap_or_default(),
        created_at: Utc::now(),
    };

    let meta_chunks: Vec<Chunk> = chunks
        .iter()
        .enumerate()
        .map(|(i, c)| Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            chunk_index: i as u32,
            content: c.text.clone(),
            embedding: Some(c.embedding.clone()),
            char_count: c.text.len() as u32,
            created_at: document.created_at,
        })
        .collect();

    state.metastore.ingest_document(&document, &meta_chunks, &[]).await.unwrap();

    let indexed: Vec<IndexedChunk> = meta_chunks
        .iter()
        .map(|c| IndexedChunk {
            document_id: document.id.clone(),
            chunk_index: c.chunk_index,
            text: c.content.clone(),
            file_name: document.file_name.clone(),
            title: title.map(|t| t.to_string()),
            source_type: document.source_type,
            user_id: user_id.to_string(),
            space_id: space_id.to_string(),
            created_at: document.created_at,
            embedding: c.embedding.clone().unwrap(),
        })
        .collect();
    state.search_index.bulk_index_chunks(&indexed).await.unwrap();

    document
}
