//! Server binary.
//!
//! This is the main entry point for running the service as a standalone server.
//! For library usage, import from the crate instead.

mod cli;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use cli::output::Output;
use cli::{Cli, Commands};
use retrieva::auth::jwt::AuthService;
use retrieva::db::ares_vector::AresVectorStore;
use retrieva::db::metastore::MetaStore;
use retrieva::db::VectorStore;
use retrieva::ingest::blob_store::LocalBlobStore;
use retrieva::ingest::extract::Extractor;
use retrieva::ingest::Ingestor;
use retrieva::rag::cache::{Cache, CacheConfig};
use retrieva::rag::chunker::{ChunkerConfig, TextChunker};
use retrieva::rag::embeddings::{EmbeddingConfig, EmbeddingModelType, EmbeddingService};
use retrieva::rag::retriever::{Retriever, RetrieverConfig};
use retrieva::rag::search_index::SearchIndex;
use retrieva::rag::synthesizer::{Synthesizer, SynthesizerConfig};
use retrieva::research::deep_research::DeepResearchAgent;
use retrieva::tools::websearch::build_web_search;
use retrieva::{api, AppState, AresConfigManager, ConfigBasedLLMFactory};
use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color { Output::no_color() } else { Output::new() };

    if let Some(Commands::Init { path, force, host, port }) = cli.command {
        let result = cli::init::run(cli::init::InitConfig { path, force, host, port }, &output);
        return match result {
            cli::init::InitResult::Success | cli::init::InitResult::AlreadyExists => Ok(()),
            cli::init::InitResult::Error(e) => Err(e.into()),
        };
    }

    let config_file = cli.config;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting the retrieval and synthesis service");

    if !config_file.exists() {
        panic!(
            "Configuration file '{}' not found!\n\
             The service requires ares.toml to run.\n\
             Run 'retrieva-server init' to scaffold one.",
            config_file.display(),
        );
    }

    let mut config_manager = AresConfigManager::new(&config_file)
        .expect("failed to load ares.toml - check for syntax errors");
    config_manager
        .start_watching()
        .expect("failed to start config file watcher");
    let config_manager = Arc::new(config_manager);
    let config = config_manager.config();

    tracing::info!("configuration loaded from {} (hot-reload enabled)", config_file.display());

    // =================================================================
    // MetaStore
    // =================================================================
    let metastore = if let (Some(url_env), Some(token_env)) =
        (&config.database.turso_url_env, &config.database.turso_token_env)
    {
        match (std::env::var(url_env), std::env::var(token_env)) {
            (Ok(url), Ok(token)) if !url.is_empty() && !token.is_empty() => {
                tracing::info!("opening remote MetaStore (Turso)");
                MetaStore::open_remote(&url, &token).await?
            }
            _ => open_local_metastore(&config.database.url).await?,
        }
    } else {
        open_local_metastore(&config.database.url).await?
    };
    metastore.init_schema().await?;
    let metastore = Arc::new(metastore);
    tracing::info!("MetaStore initialized");

    // =================================================================
    // VectorStore + SearchIndex
    // =================================================================
    let vector_store: Arc<dyn VectorStore> =
        Arc::new(AresVectorStore::open(Some(PathBuf::from("./data/search"))).await?);
    let search_index = Arc::new(SearchIndex::new(
        vector_store,
        config.rag.text_dim,
        config.rag.image_dim,
    ));
    tracing::info!("SearchIndex initialized ({}-dim text, {}-dim image)", config.rag.text_dim, config.rag.image_dim);

    // =================================================================
    // Cache
    // =================================================================
    let cache_config = CacheConfig {
        default_ttl: std::time::Duration::from_secs(config.cache.ttl_semantic),
        circuit_breaker_threshold: config.cache.failure_threshold,
        circuit_breaker_cooldown: std::time::Duration::from_secs(config.cache.cooldown),
        ..CacheConfig::default()
    };
    let cache = Arc::new(Cache::new(cache_config));

    // =================================================================
    // Embeddings
    // =================================================================
    let embedding_model = EmbeddingModelType::from_str(&config.rag.embedding_model).unwrap_or_default();
    let embeddings = Arc::new(EmbeddingService::new(EmbeddingConfig {
        model: embedding_model,
        ..EmbeddingConfig::default()
    }));
    tracing::info!("embedding model: {embedding_model}");

    // =================================================================
    // BlobStore
    // =================================================================
    let blob_store: Arc<dyn retrieva::ingest::blob_store::BlobStore> =
        Arc::new(LocalBlobStore::new(config.blob_store.root_dir.clone()));

    // =================================================================
    // Ingestor
    // =================================================================
    let chunker = TextChunker::new(ChunkerConfig {
        chunk_size: config.rag.chunk_size,
        chunk_overlap: config.rag.chunk_overlap,
        ..ChunkerConfig::default()
    });
    let ingestor = Arc::new(Ingestor::new(
        Arc::clone(&blob_store),
        Extractor::new(),
        chunker,
        Arc::clone(&embeddings),
        Arc::clone(&metastore),
        Arc::clone(&search_index),
        Arc::clone(&cache),
    ));

    // =================================================================
    // LLM factory
    // =================================================================
    let llm_factory = Arc::new(
        ConfigBasedLLMFactory::from_config(&config).expect("failed to create LLM factory from config"),
    );
    tracing::info!("LLM factory initialized with default model: {}", llm_factory.default_model());
    let generator: Arc<dyn retrieva::LLMClient> = Arc::from(llm_factory.create_default().await?);

    // =================================================================
    // Retriever + Synthesizer
    // =================================================================
    let retriever_config = RetrieverConfig {
        mmr_enabled: config.retrieval.hybrid_mmr_enable,
        mmr_lambda: config.retrieval.hybrid_mmr_lambda,
        model_id: config.rag.embedding_model.clone(),
        ..RetrieverConfig::from_env()
    };
    let retriever = Arc::new(Retriever::new(
        Arc::clone(&search_index),
        Arc::clone(&cache),
        Arc::clone(&embeddings),
        retriever_config,
    ));

    let synthesizer = Arc::new(Synthesizer::new(
        Arc::clone(&generator),
        Arc::clone(&cache),
        SynthesizerConfig {
            cache_ttl_seconds: config.cache.ttl_llm,
            model_id: llm_factory.default_model().to_string(),
            ..SynthesizerConfig::default()
        },
    ));

    // =================================================================
    // Deep Research agent
    // =================================================================
    let web_search = Arc::from(build_web_search(&config.web, config.deep_research.web_timeout())?);
    let deep_research = Arc::new(DeepResearchAgent::new(
        Arc::clone(&generator),
        Arc::clone(&retriever),
        web_search,
        Arc::clone(&metastore),
        Arc::clone(&cache),
        config.deep_research.clone(),
    ));

    // =================================================================
    // Auth service
    // =================================================================
    let jwt_secret = config.jwt_secret().expect("JWT_SECRET environment variable must be set");
    let auth_service = Arc::new(AuthService::new(
        jwt_secret,
        config.auth.jwt_access_expiry,
        config.auth.jwt_refresh_expiry,
    ));
    tracing::info!("auth service initialized");

    // =================================================================
    // Application state
    // =================================================================
    let state = AppState {
        config_manager: Arc::clone(&config_manager),
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
        auth_service,
    };

    // =================================================================
    // Router
    // =================================================================
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/config/info", get(config_info))
        .merge(api::routes::create_router(Arc::clone(&state.auth_service)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("server running on http://{addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn open_local_metastore(url: &str) -> Result<MetaStore, Box<dyn std::error::Error>> {
    if !url.contains(":memory:") {
        let path = url.strip_prefix("file:").unwrap_or(url);
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    tracing::info!(database_url = %url, "initializing local MetaStore");
    Ok(MetaStore::open_local(url).await?)
}

/// Liveness probe.
async fn health_check() -> &'static str {
    "OK"
}

/// Non-sensitive configuration summary (SPEC_FULL.md §6).
async fn config_info(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<serde_json::Value> {
    let config = state.config_manager.config();
    axum::Json(serde_json::json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port,
            "log_level": config.server.log_level,
        },
        "providers": config.providers.keys().collect::<Vec<_>>(),
        "models": config.models.keys().collect::<Vec<_>>(),
        "rag": {
            "embedding_model": config.rag.embedding_model,
            "chunk_size": config.rag.chunk_size,
        },
    }))
}
