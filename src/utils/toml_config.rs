//! TOML-based configuration for A.R.E.S
//!
//! This module provides declarative configuration for providers, models, agents,
//! tools, and workflows via a TOML file (`ares.toml`).
//!
//! # Hot Reloading
//!
//! Configuration changes are automatically detected and applied at runtime.
//! Use `AresConfigManager` for thread-safe access to the current configuration.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Root configuration structure loaded from ares.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AresConfig {
    /// HTTP server configuration (host, port, log level).
    pub server: ServerConfig,

    /// Authentication configuration (JWT secrets, expiry times).
    pub auth: AuthConfig,

    /// Database configuration (Turso/SQLite, Qdrant).
    pub database: DatabaseConfig,

    /// Named LLM provider configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Named model configurations that reference providers
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,

    /// RAG configuration (embedding model, chunking)
    #[serde(default)]
    pub rag: RagConfig,

    /// Hybrid retrieval tuning
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Cache TTLs and circuit breaker tuning
    #[serde(default)]
    pub cache: CacheTuningConfig,

    /// Deep Research agent tuning
    #[serde(default)]
    pub deep_research: DeepResearchConfig,

    /// Web search provider selection
    #[serde(default)]
    pub web: WebConfig,

    /// Ranking boosts applied by SearchIndex
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Local filesystem BlobStore configuration
    #[serde(default)]
    pub blob_store: BlobStoreConfig,
}

// ============= BlobStore Configuration =============

/// Local filesystem BlobStore configuration (SPEC_FULL.md §4.B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    /// Root directory blobs are written under (default: "./data/blobs").
    #[serde(default = "default_blob_root_dir")]
    pub root_dir: String,
}

fn default_blob_root_dir() -> String {
    "./data/blobs".to_string()
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            root_dir: default_blob_root_dir(),
        }
    }
}

// ============= Server Configuration =============

/// Server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,

    /// Port number to listen on (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level: "trace", "debug", "info", "warn", "error" (default: "info").
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// ============= Authentication Configuration =============

/// Authentication configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable name containing the JWT secret.
    pub jwt_secret_env: String,

    /// JWT access token expiry time in seconds (default: 900 = 15 minutes).
    #[serde(default = "default_jwt_access_expiry")]
    pub jwt_access_expiry: i64,

    /// JWT refresh token expiry time in seconds (default: 604800 = 7 days).
    #[serde(default = "default_jwt_refresh_expiry")]
    pub jwt_refresh_expiry: i64,

    /// Environment variable name containing the API key.
    pub api_key_env: String,
}

fn default_jwt_access_expiry() -> i64 {
    900
}

fn default_jwt_refresh_expiry() -> i64 {
    604800
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret_env: "JWT_SECRET".to_string(),
            jwt_access_expiry: default_jwt_access_expiry(),
            jwt_refresh_expiry: default_jwt_refresh_expiry(),
            api_key_env: "API_KEY".to_string(),
        }
    }
}

// ============= Database Configuration =============

/// Database configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Local database URL/path (default: "./data/ares.db").
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Environment variable for Turso URL (optional cloud config).
    pub turso_url_env: Option<String>,

    /// Environment variable for Turso auth token.
    pub turso_token_env: Option<String>,

    /// Qdrant vector database configuration (optional).
    pub qdrant: Option<QdrantConfig>,
}

fn default_database_url() -> String {
    "./data/ares.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            turso_url_env: None,
            turso_token_env: None,
            qdrant: None,
        }
    }
}

/// Qdrant vector database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    /// Qdrant server URL (default: "http://localhost:6334").
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Environment variable for Qdrant API key.
    pub api_key_env: Option<String>,
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            api_key_env: None,
        }
    }
}

// ============= Provider Configuration =============

/// LLM provider configuration. Tagged enum based on provider type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Ollama local LLM server.
    Ollama {
        /// Ollama server URL (default: "http://localhost:11434").
        #[serde(default = "default_ollama_url")]
        base_url: String,
        /// Default model to use with this provider.
        default_model: String,
    },
    /// OpenAI API (or compatible endpoints).
    OpenAI {
        /// Environment variable containing API key.
        api_key_env: String,
        /// API base URL (default: `https://api.openai.com/v1`).
        #[serde(default = "default_openai_base")]
        api_base: String,
        /// Default model to use with this provider.
        default_model: String,
    },
    /// LlamaCpp for direct GGUF model loading.
    LlamaCpp {
        /// Path to the GGUF model file.
        model_path: String,
        /// Context window size (default: 4096).
        #[serde(default = "default_n_ctx")]
        n_ctx: u32,
        /// Number of threads for inference (default: 4).
        #[serde(default = "default_n_threads")]
        n_threads: u32,
        /// Maximum tokens to generate (default: 512).
        #[serde(default = "default_max_tokens")]
        max_tokens: u32,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_n_ctx() -> u32 {
    4096
}

fn default_n_threads() -> u32 {
    4
}

fn default_max_tokens() -> u32 {
    512
}

// ============= Model Configuration =============

/// Model configuration referencing a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Reference to a provider name defined in \[providers\].
    pub provider: String,

    /// Model name/identifier to use with the provider.
    pub model: String,

    /// Sampling temperature (0.0 = deterministic, 1.0+ = creative). Default: 0.7.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate (default: 512).
    #[serde(default = "default_model_max_tokens")]
    pub max_tokens: u32,

    /// Optional nucleus sampling parameter.
    pub top_p: Option<f32>,

    /// Optional frequency penalty (-2.0 to 2.0).
    pub frequency_penalty: Option<f32>,

    /// Optional presence penalty (-2.0 to 2.0).
    pub presence_penalty: Option<f32>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_model_max_tokens() -> u32 {
    512
}

// ============= RAG Configuration =============

/// RAG (Retrieval Augmented Generation) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Embedding model to use for vector embeddings (default: "BAAI/bge-small-en-v1.5").
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Size of text chunks for indexing, in characters (default: 2500).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks, in characters (default: 250).
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Text embedding dimension (default: 384).
    #[serde(default = "default_text_dim")]
    pub text_dim: usize,

    /// Image embedding dimension (default: 768).
    #[serde(default = "default_image_dim")]
    pub image_dim: usize,
}

fn default_embedding_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

fn default_chunk_size() -> usize {
    2500
}

fn default_chunk_overlap() -> usize {
    250
}

fn default_text_dim() -> usize {
    384
}

fn default_image_dim() -> usize {
    768
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_model: default_embedding_model(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            text_dim: default_text_dim(),
            image_dim: default_image_dim(),
        }
    }
}

// ============= Retrieval Configuration =============

/// Hybrid-retrieval tuning (SPEC_FULL.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Which store backs `SearchIndex` queries.
    #[serde(default = "default_retrieval_backend")]
    pub backend: String,

    /// Whether chunk embeddings are additionally persisted in MetaStore (not just SearchIndex).
    #[serde(default)]
    pub persist_embeddings_in_metastore: bool,

    /// Enable the post-fusion MMR diversification pass.
    #[serde(default)]
    pub hybrid_mmr_enable: bool,

    /// MMR relevance/diversity trade-off in `[0, 1]`.
    #[serde(default = "default_mmr_lambda")]
    pub hybrid_mmr_lambda: f32,
}

fn default_retrieval_backend() -> String {
    "searchindex".to_string()
}

fn default_mmr_lambda() -> f32 {
    0.5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_retrieval_backend(),
            persist_embeddings_in_metastore: false,
            hybrid_mmr_enable: false,
            hybrid_mmr_lambda: default_mmr_lambda(),
        }
    }
}

// ============= Cache Configuration (declarative) =============

/// Declarative cache tuning loaded from `ares.toml`; translated into
/// [`crate::rag::cache::CacheConfig`] and per-kind TTLs at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTuningConfig {
    /// TTL for semantic/lexical/hybrid retrieval entries, in seconds (default: 300).
    #[serde(default = "default_ttl_semantic")]
    pub ttl_semantic: u64,

    /// TTL for synthesized-answer entries, in seconds (default: 900).
    #[serde(default = "default_ttl_llm")]
    pub ttl_llm: u64,

    /// Consecutive upstream failures before the circuit breaker opens (default: 5).
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u64,

    /// Circuit breaker cooldown, in seconds (default: 60).
    #[serde(default = "default_cooldown")]
    pub cooldown: u64,

    /// Cache key schema version; bump to invalidate all entries from a previous deploy.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
}

fn default_ttl_semantic() -> u64 {
    300
}

fn default_ttl_llm() -> u64 {
    900
}

fn default_failure_threshold() -> u64 {
    5
}

fn default_cooldown() -> u64 {
    60
}

fn default_schema_version() -> String {
    "v1".to_string()
}

impl Default for CacheTuningConfig {
    fn default() -> Self {
        Self {
            ttl_semantic: default_ttl_semantic(),
            ttl_llm: default_ttl_llm(),
            failure_threshold: default_failure_threshold(),
            cooldown: default_cooldown(),
            schema_version: default_schema_version(),
        }
    }
}

// ============= Deep Research Configuration =============

/// DeepResearchAgent tuning (SPEC_FULL.md §4.K, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepResearchConfig {
    /// Wall-clock budget for a single `ask`, in seconds (default: 120).
    #[serde(default = "default_t_total")]
    pub t_total_seconds: u64,

    /// Local hits retrieved per sub-question (default: 8).
    #[serde(default = "default_top_k_local")]
    pub top_k_local: usize,

    /// Web hits fetched when WEB_SEARCH runs (default: 6).
    #[serde(default = "default_top_k_web")]
    pub top_k_web: usize,

    /// REWRITE → LOCAL_RETRIEVE loops allowed (default: 1).
    #[serde(default = "default_retry_loops")]
    pub retry_loops: u8,

    /// MISSING_CONCEPTS loop count `L` (default: 1).
    #[serde(default = "default_missing_concept_loops")]
    pub missing_concept_loops: u8,

    /// Minimum hit count for coverage to be considered strong (`h_min`, default: 3).
    #[serde(default = "default_h_min")]
    pub h_min: usize,

    /// Minimum distinct documents for coverage to be considered strong (`d_min`, default: 2).
    #[serde(default = "default_d_min")]
    pub d_min: usize,

    /// Maximum best-hit distance for coverage to be considered strong (`delta_max`, default: 0.6).
    #[serde(default = "default_delta_max")]
    pub delta_max: f32,

    /// Confidence below which follow-up questions are generated (default: 0.4).
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Floor every returned confidence is clamped above (default: 0.3).
    #[serde(default = "default_confidence_baseline")]
    pub confidence_baseline: f32,

    /// Per-fetch web timeout, in seconds (default: 10).
    #[serde(default = "default_web_timeout")]
    pub web_timeout_seconds: u64,

    /// Whether recency boosts local retrieval ranking during Deep Research.
    #[serde(default)]
    pub recency_boost: bool,

    /// Recency decay half-life scale, in days (default: 30).
    #[serde(default = "default_recency_scale_days")]
    pub recency_scale_days: u32,

    /// Whether follow-up questions are auto-sent to the caller (vs. requiring confirmation).
    #[serde(default = "default_true")]
    pub followup_autosend: bool,

    /// Minimum relevance a follow-up question must have to the current exchange (default: 0.08).
    #[serde(default = "default_followup_relevance_min")]
    pub followup_relevance_min: f32,
}

fn default_true() -> bool {
    true
}

fn default_t_total() -> u64 {
    120
}

fn default_top_k_local() -> usize {
    8
}

fn default_top_k_web() -> usize {
    6
}

fn default_retry_loops() -> u8 {
    1
}

fn default_missing_concept_loops() -> u8 {
    1
}

fn default_h_min() -> usize {
    3
}

fn default_d_min() -> usize {
    2
}

fn default_delta_max() -> f32 {
    0.6
}

fn default_confidence_threshold() -> f32 {
    0.4
}

fn default_confidence_baseline() -> f32 {
    0.3
}

fn default_web_timeout() -> u64 {
    10
}

fn default_recency_scale_days() -> u32 {
    30
}

fn default_followup_relevance_min() -> f32 {
    0.08
}

impl Default for DeepResearchConfig {
    fn default() -> Self {
        Self {
            t_total_seconds: default_t_total(),
            top_k_local: default_top_k_local(),
            top_k_web: default_top_k_web(),
            retry_loops: default_retry_loops(),
            missing_concept_loops: default_missing_concept_loops(),
            h_min: default_h_min(),
            d_min: default_d_min(),
            delta_max: default_delta_max(),
            confidence_threshold: default_confidence_threshold(),
            confidence_baseline: default_confidence_baseline(),
            web_timeout_seconds: default_web_timeout(),
            recency_boost: false,
            recency_scale_days: default_recency_scale_days(),
            followup_autosend: true,
            followup_relevance_min: default_followup_relevance_min(),
        }
    }
}

impl DeepResearchConfig {
    pub fn t_total(&self) -> Duration {
        Duration::from_secs(self.t_total_seconds)
    }

    pub fn web_timeout(&self) -> Duration {
        Duration::from_secs(self.web_timeout_seconds)
    }
}

// ============= Web Search Configuration =============

/// Which external web-search backend [`crate::tools::websearch::WebSearch`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebSearchProvider {
    Serpapi,
    Bing,
    Ddg,
    /// No web backend configured; `WEB_SEARCH` is always skipped.
    None,
}

impl Default for WebSearchProvider {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebConfig {
    #[serde(default)]
    pub provider: WebSearchProvider,

    /// Environment variable holding the provider API key, if the provider requires one.
    pub api_key_env: Option<String>,
}

// ============= Ranking Configuration =============

/// Per-field BM25 boosts applied by [`crate::rag::search_index::SearchIndex`] (SPEC_FULL.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Boosts {
    #[serde(default = "default_boost_text")]
    pub text: f32,
    #[serde(default = "default_boost_title")]
    pub title: f32,
    #[serde(default = "default_boost_file_name")]
    pub file_name: f32,
}

fn default_boost_text() -> f32 {
    1.0
}

fn default_boost_title() -> f32 {
    2.5
}

fn default_boost_file_name() -> f32 {
    2.0
}

impl Default for Bm25Boosts {
    fn default() -> Self {
        Self {
            text: default_boost_text(),
            title: default_boost_title(),
            file_name: default_boost_file_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RankingConfig {
    #[serde(default)]
    pub bm25_boosts: Bm25Boosts,

    /// Weight applied to the recency-decay term when blending into a hit's final score.
    #[serde(default)]
    pub recency_weight: Option<f32>,
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// Category of the warning.
    pub kind: ConfigWarningKind,

    /// Human-readable warning message.
    pub message: String,
}

/// Categories of configuration warnings.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    /// A provider is defined but not referenced by any model.
    UnusedProvider,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file was not found at the specified path.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to read the configuration file from disk.
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse the TOML content.
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// An environment variable referenced in the config is not set.
    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    /// A provider referenced by a model does not exist.
    #[error("Provider '{0}' referenced by model '{1}' does not exist")]
    MissingProvider(String, String),

    /// An error occurred while watching configuration files for changes.
    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl AresConfig {
    /// Load configuration from a TOML file
    ///
    /// # Panics
    ///
    /// Panics if the configuration file doesn't exist or is invalid.
    /// This is intentional - the server cannot run without a valid config.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AresConfig = toml::from_str(&content)?;

        // Validate the configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate auth env vars exist
        self.validate_env_var(&self.auth.jwt_secret_env)?;
        self.validate_env_var(&self.auth.api_key_env)?;

        // Validate database env vars if specified
        if let Some(ref env) = self.database.turso_url_env {
            self.validate_env_var(env)?;
        }
        if let Some(ref env) = self.database.turso_token_env {
            self.validate_env_var(env)?;
        }
        if let Some(ref qdrant) = self.database.qdrant {
            if let Some(ref env) = qdrant.api_key_env {
                self.validate_env_var(env)?;
            }
        }

        // Validate provider env vars
        for (name, provider) in &self.providers {
            match provider {
                ProviderConfig::OpenAI { api_key_env, .. } => {
                    self.validate_env_var(api_key_env)?;
                }
                ProviderConfig::LlamaCpp { model_path, .. } => {
                    // Validate model path exists
                    if !Path::new(model_path).exists() {
                        return Err(ConfigError::ValidationError(format!(
                            "LlamaCpp model path does not exist: {} (provider: {})",
                            model_path, name
                        )));
                    }
                }
                ProviderConfig::Ollama { .. } => {
                    // Ollama doesn't require validation - it's the default fallback
                }
            }
        }

        // Validate model -> provider references
        for (model_name, model_config) in &self.models {
            if !self.providers.contains_key(&model_config.provider) {
                return Err(ConfigError::MissingProvider(
                    model_config.provider.clone(),
                    model_name.clone(),
                ));
            }
        }

        Ok(())
    }

    /// Validate configuration with warnings for unused items
    ///
    /// Returns Ok with warnings, or Err if validation fails
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;
        Ok(self.check_unused_providers())
    }

    /// Check for providers that aren't referenced by any model
    fn check_unused_providers(&self) -> Vec<ConfigWarning> {
        use std::collections::HashSet;

        let referenced: HashSet<_> = self.models.values().map(|m| m.provider.as_str()).collect();

        self.providers
            .keys()
            .filter(|name| !referenced.contains(name.as_str()))
            .map(|name| ConfigWarning {
                kind: ConfigWarningKind::UnusedProvider,
                message: format!(
                    "Provider '{}' is defined but not referenced by any model",
                    name
                ),
            })
            .collect()
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Get the JWT secret from the environment
    pub fn jwt_secret(&self) -> Result<String, ConfigError> {
        self.resolve_env(&self.auth.jwt_secret_env)
            .ok_or_else(|| ConfigError::MissingEnvVar(self.auth.jwt_secret_env.clone()))
    }

    /// Get the API key from the environment
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.resolve_env(&self.auth.api_key_env)
            .ok_or_else(|| ConfigError::MissingEnvVar(self.auth.api_key_env.clone()))
    }

    /// Get provider by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Get model by name
    pub fn get_model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.get(name)
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct AresConfigManager {
    config: Arc<ArcSwap<AresConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
    reload_tx: Option<mpsc::UnboundedSender<()>>,
}

impl AresConfigManager {
    /// Create a new configuration manager and load the initial config
    ///
    /// # Panics
    ///
    /// Panics if ares.toml doesn't exist or is invalid.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Convert to absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = AresConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
            reload_tx: None,
        })
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<AresConfig> {
        self.config.load_full()
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = AresConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&mut self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        self.reload_tx = Some(tx.clone());

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);

        // Create debounced file watcher
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        // Send reload signal (debounced in the receiver)
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        // Watch the config file's parent directory
        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        // Spawn reload handler with debouncing
        let config_path_clone = config_path.clone();
        tokio::spawn(async move {
            let mut last_reload = std::time::Instant::now();
            let debounce_duration = Duration::from_millis(500);

            while rx.recv().await.is_some() {
                // Debounce: only reload if enough time has passed
                if last_reload.elapsed() < debounce_duration {
                    continue;
                }

                // Wait a bit for file write to complete
                tokio::time::sleep(Duration::from_millis(100)).await;

                match AresConfig::load(&config_path_clone) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = std::time::Instant::now();
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for AresConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
            reload_tx: self.reload_tx.clone(),
        }
    }
}

impl AresConfigManager {
    /// Create a config manager directly from a config (useful for testing)
    /// This won't have file watching capabilities.
    pub fn from_config(config: AresConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("test-config.toml"),
            watcher: RwLock::new(None),
            reload_tx: None,
        }
    }
}
