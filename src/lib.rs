//! # Core — multi-tenant RAG retrieval and synthesis service
//!
//! A document ingestion, hybrid retrieval, and Deep Research service built in Rust, with
//! multi-provider LLM support and a thin JWT-bearer auth layer.
//!
//! ## Quick Start (Library Usage)
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! ares-server = "0.2"
//! ```
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use retrieva::llm::Provider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Provider::Ollama {
//!         base_url: "http://localhost:11434".to_string(),
//!         model: "llama3.2:3b".to_string(),
//!     };
//!
//!     let client = provider.create_client().await?;
//!     let response = client.generate("Hello, world!").await?;
//!     println!("{}", response);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI API support |
//! | `llamacpp` | Direct GGUF model loading |
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`auth`] - JWT-bearer authentication
//! - [`db`] - MetaStore (relational) and VectorStore abstractions
//! - [`ingest`] - Extraction, chunking, embedding, blob storage
//! - [`llm`] - LLM client implementations
//! - [`rag`] - Cache, retrieval, synthesis, search index
//! - [`research`] - Deep Research agent
//! - [`tools`] - Web search
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration with hot-reload
//!
//! ## Architecture
//!
//! Configuration is loaded from a single `ares.toml`, hot-reloadable via [`utils::toml_config::AresConfigManager`].
//! State is persisted under `./data`: `./data/{db-file}` (MetaStore), `./data/search/` (SearchIndex
//! snapshot), `./data/blobs/` (BlobStore).

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// JWT-bearer authentication and middleware.
pub mod auth;
/// MetaStore (relational) and VectorStore abstractions.
pub mod db;
/// Ingestion pipeline: extraction, chunking, embedding, dual-write (SPEC_FULL.md §4.H).
pub mod ingest;
/// LLM provider clients and abstractions.
pub mod llm;
/// Retrieval Augmented Generation (RAG) components: cache, chunker, embeddings, retriever,
/// search index, synthesizer.
pub mod rag;
/// Deep Research agent.
pub mod research;
/// Built-in tools (web search).
pub mod tools;
/// Core types (entities, errors).
pub mod types;
/// Configuration utilities (TOML).
pub mod utils;

// Re-export commonly used types
pub use llm::{ConfigBasedLLMFactory, LLMClient, LLMResponse, Provider, ProviderRegistry};
pub use types::{CoreError, Result};
pub use utils::toml_config::{AresConfig, AresConfigManager};

use std::sync::Arc;

use crate::auth::jwt::AuthService;
use crate::db::metastore::MetaStore;
use crate::ingest::blob_store::BlobStore;
use crate::ingest::Ingestor;
use crate::rag::cache::Cache;
use crate::rag::embeddings::EmbeddingService;
use crate::rag::retriever::Retriever;
use crate::rag::search_index::SearchIndex;
use crate::rag::synthesizer::Synthesizer;
use crate::research::deep_research::DeepResearchAgent;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// TOML-based configuration with hot-reload support.
    pub config_manager: Arc<AresConfigManager>,
    /// Authoritative relational store (users, spaces, documents, chunks, images, sessions).
    pub metastore: Arc<MetaStore>,
    /// In-memory vector + BM25 index, rebuildable from MetaStore via `/admin/reindex`.
    pub search_index: Arc<SearchIndex>,
    /// Revisioned retrieval/synthesis cache.
    pub cache: Arc<Cache>,
    /// Text/image embedding runner.
    pub embeddings: Arc<EmbeddingService>,
    /// External binary storage for uploaded files and extracted images.
    pub blob_store: Arc<dyn BlobStore>,
    /// Ingestion pipeline orchestrator.
    pub ingestor: Arc<Ingestor>,
    /// Semantic/lexical/hybrid retrieval over the search index.
    pub retriever: Arc<Retriever>,
    /// Single-shot RAG answer synthesis.
    pub synthesizer: Arc<Synthesizer>,
    /// Deep Research agent.
    pub deep_research: Arc<DeepResearchAgent>,
    /// LLM client factory (config-based).
    pub llm_factory: Arc<ConfigBasedLLMFactory>,
    /// JWT-bearer token service.
    pub auth_service: Arc<AuthService>,
}
