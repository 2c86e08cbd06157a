//! Retrieval pipeline: embed, chunk, index, cache, retrieve, synthesize.
//!
//! # Module structure
//!
//! - [`chunker`] - recursive-separator text chunking (SPEC_FULL.md §4.G)
//! - [`embeddings`] - `fastembed`-backed text and image embedding (§4.C)
//! - [`cache`] - revisioned best-effort result cache (§4.D)
//! - [`search_index`] - derived BM25 + HNSW index, tenant-scoped (§4.E)
//! - [`retriever`] - semantic/lexical/hybrid retrieval with RRF fusion (§4.I)
//! - [`synthesizer`] - single-shot RAG answer synthesis (§4.J)
//!
//! # Pipeline
//!
//! Ingestion: chunk → embed → MetaStore + SearchIndex.
//! Query: Retriever consults Cache, falls back to SearchIndex, optionally hands hits to
//! Synthesizer or to [`crate::research::deep_research`] for the agentic path.

pub mod cache;
pub mod chunker;
pub mod embeddings;
pub mod retriever;
pub mod search_index;
pub mod synthesizer;
