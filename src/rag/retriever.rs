//! Semantic / lexical / hybrid retrieval over [`crate::rag::search_index::SearchIndex`],
//! cache-first via [`crate::rag::cache::Cache`] (SPEC_FULL.md §4.I).
//!
//! Generalizes the teacher's `SearchEngine::search_hybrid` (RRF-based fusion of BM25 + vector
//! results) into three explicit modes plus a cache layer and optional MMR diversification pass.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::rag::cache::{Cache, CacheKind};
use crate::rag::embeddings::EmbeddingService;
use crate::rag::search_index::{IndexHit, RecencyDecay, SearchIndex};
use crate::types::{Hit, Result};

/// Reciprocal Rank Fusion constant (SPEC_FULL.md §4.I): `score(d) = Σ 1/(k0 + rank_i(d))`.
const RRF_K0: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveMode {
    Semantic,
    Lexical,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub default_top_k: usize,
    pub cache_ttl_seconds: u64,
    pub recency: Option<RecencyDecay>,
    /// Env-gated: off unless `RETRIEVA_MMR_ENABLED=1` (see [`RetrieverConfig::from_env`]).
    pub mmr_enabled: bool,
    pub mmr_lambda: f32,
    /// When true, `hybrid` aggregates to one hit per document (best chunk wins) before `top_k`
    /// truncation.
    pub doc_aggregate: bool,
    pub backend_label: String,
    pub model_id: String,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            cache_ttl_seconds: 300,
            recency: None,
            mmr_enabled: false,
            mmr_lambda: 0.5,
            doc_aggregate: false,
            backend_label: "searchindex".to_string(),
            model_id: "bge-small-en-v1.5".to_string(),
        }
    }
}

impl RetrieverConfig {
    /// Reads `RETRIEVA_MMR_ENABLED` / `RETRIEVA_MMR_LAMBDA` on top of [`Default`].
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("RETRIEVA_MMR_ENABLED") {
            config.mmr_enabled = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("RETRIEVA_MMR_LAMBDA") {
            if let Ok(lambda) = v.parse::<f32>() {
                config.mmr_lambda = lambda.clamp(0.0, 1.0);
            }
        }
        config
    }
}

/// Retrieval filters beyond `(user_id, space_id)`; folded into the cache fingerprint so distinct
/// filter sets never collide on the same cache key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrieveFilters {
    pub document_ids: Option<Vec<String>>,
}

impl RetrieveFilters {
    fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub struct Retriever {
    search_index: Arc<SearchIndex>,
    cache: Arc<Cache>,
    embedder: Arc<EmbeddingService>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        search_index: Arc<SearchIndex>,
        cache: Arc<Cache>,
        embedder: Arc<EmbeddingService>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            search_index,
            cache,
            embedder,
            config,
        }
    }

    fn normalize_query(query: &str) -> String {
        query.trim().to_lowercase()
    }

    fn cache_key(&self, user_id: &str, space_id: &str, mode: RetrieveMode, top_k: usize, query: &str, filters: &RetrieveFilters) -> String {
        let normalized = Self::normalize_query(query);
        let mode_label = match mode {
            RetrieveMode::Semantic => "semantic",
            RetrieveMode::Lexical => "lexical",
            RetrieveMode::Hybrid => "hybrid",
        };
        let fingerprint = Cache::fingerprint(
            &normalized,
            &format!("{mode_label}:{}", filters.canonical_json()),
            &self.config.backend_label,
            &self.config.model_id,
        );
        self.cache.make_key(user_id, space_id, CacheKind::Text, top_k, &fingerprint)
    }

    fn apply_filters(hits: Vec<IndexHit>, filters: &RetrieveFilters) -> Vec<IndexHit> {
        match &filters.document_ids {
            None => hits,
            Some(allowed) => hits.into_iter().filter(|h| allowed.contains(&h.document_id)).collect(),
        }
    }

    fn to_hit(h: &IndexHit) -> Hit {
        Hit {
            document_id: h.document_id.clone(),
            chunk_index: h.chunk_index,
            content: h.content.clone(),
            file_name: h.file_name.clone(),
            user_id: h.user_id.clone(),
            space_id: h.space_id.clone(),
            score: h.score,
            created_at: h.created_at,
        }
    }

    fn cache_get(&self, key: &str) -> Option<Vec<Hit>> {
        let value = self.cache.get(key)?;
        serde_json::from_value(value).ok()
    }

    fn cache_put(&self, key: &str, hits: &[Hit]) {
        if let Ok(value) = serde_json::to_value(hits) {
            self.cache.set(key, value, Some(std::time::Duration::from_secs(self.config.cache_ttl_seconds)));
        }
    }

    pub async fn semantic(
        &self,
        user_id: &str,
        space_id: &str,
        query: &str,
        top_k: Option<usize>,
        filters: &RetrieveFilters,
    ) -> Result<Vec<Hit>> {
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        let key = self.cache_key(user_id, space_id, RetrieveMode::Semantic, top_k, query, filters);
        if let Some(cached) = self.cache_get(&key) {
            return Ok(cached);
        }

        let vector = self.embedder.embed_text(query).await?;
        let raw = self
            .search_index
            .knn_search(user_id, space_id, &vector, top_k, self.config.recency)
            .await?;
        let filtered = Self::apply_filters(raw, filters);
        let hits: Vec<Hit> = filtered.iter().take(top_k).map(Self::to_hit).collect();
        self.cache_put(&key, &hits);
        Ok(hits)
    }

    pub async fn lexical(
        &self,
        user_id: &str,
        space_id: &str,
        query: &str,
        top_k: Option<usize>,
        filters: &RetrieveFilters,
    ) -> Result<Vec<Hit>> {
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        let key = self.cache_key(user_id, space_id, RetrieveMode::Lexical, top_k, query, filters);
        if let Some(cached) = self.cache_get(&key) {
            return Ok(cached);
        }

        let raw = self
            .search_index
            .lexical_search(user_id, space_id, query, top_k, self.config.recency);
        let filtered = Self::apply_filters(raw, filters);
        let hits: Vec<Hit> = filtered.iter().take(top_k).map(Self::to_hit).collect();
        self.cache_put(&key, &hits);
        Ok(hits)
    }

    /// Runs semantic and lexical concurrently, fuses with RRF, optionally aggregates to one hit
    /// per document, optionally diversifies with MMR.
    pub async fn hybrid(
        &self,
        user_id: &str,
        space_id: &str,
        query: &str,
        top_k: Option<usize>,
        filters: &RetrieveFilters,
    ) -> Result<Vec<Hit>> {
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        let key = self.cache_key(user_id, space_id, RetrieveMode::Hybrid, top_k, query, filters);
        if let Some(cached) = self.cache_get(&key) {
            return Ok(cached);
        }

        // Over-fetch each leg so fusion has enough candidates to rank from.
        let fan_out = (top_k * 3).max(top_k + 10);
        let vector = self.embedder.embed_text(query).await?;
        let (semantic_raw, lexical_raw) = tokio::join!(
            self.search_index.knn_search(user_id, space_id, &vector, fan_out, self.config.recency),
            async { Ok(self.search_index.lexical_search(user_id, space_id, query, fan_out, self.config.recency)) }
        );
        let semantic_hits = Self::apply_filters(semantic_raw?, filters);
        let lexical_hits: Vec<IndexHit> = Self::apply_filters(lexical_raw?, filters);

        let mut fused = fuse_rrf(&semantic_hits, &lexical_hits);

        if self.config.doc_aggregate {
            fused = aggregate_best_per_document(fused);
        }

        let selected = if self.config.mmr_enabled {
            mmr_select(fused, top_k, self.config.mmr_lambda)
        } else {
            fused.truncate(top_k);
            fused
        };

        let hits: Vec<Hit> = selected.iter().map(Self::to_hit).collect();
        self.cache_put(&key, &hits);
        Ok(hits)
    }
}

fn hit_key(h: &IndexHit) -> String {
    format!("{}:{}", h.document_id, h.chunk_index)
}

/// `score(d) = Σ 1/(k0 + rank_i(d))` over ranked lists `semantic` then `lexical`. Ties are broken
/// by insertion order with the semantic list scanned first (resolved Open Question #1).
fn fuse_rrf(semantic: &[IndexHit], lexical: &[IndexHit]) -> Vec<IndexHit> {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, IndexHit> = HashMap::new();
    let mut scores: HashMap<String, f32> = HashMap::new();

    for (rank, hit) in semantic.iter().enumerate() {
        let key = hit_key(hit);
        *scores.entry(key.clone()).or_insert(0.0) += 1.0 / (RRF_K0 + rank as f32 + 1.0);
        if !by_key.contains_key(&key) {
            order.push(key.clone());
            by_key.insert(key, hit.clone());
        }
    }
    for (rank, hit) in lexical.iter().enumerate() {
        let key = hit_key(hit);
        *scores.entry(key.clone()).or_insert(0.0) += 1.0 / (RRF_K0 + rank as f32 + 1.0);
        if !by_key.contains_key(&key) {
            order.push(key.clone());
            by_key.insert(key, hit.clone());
        }
    }

    let mut fused: Vec<IndexHit> = order
        .into_iter()
        .map(|key| {
            let mut hit = by_key.remove(&key).expect("key came from by_key insertion");
            hit.score = scores[&key];
            hit
        })
        .collect();
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut raw_scores: Vec<f32> = fused.iter().map(|h| h.score).collect();
    crate::rag::search_index::normalize_scores(&mut raw_scores);
    for (hit, score) in fused.iter_mut().zip(raw_scores) {
        hit.score = score;
    }
    fused
}

/// Keep only the best-scored chunk per `document_id`, preserving fused rank order.
fn aggregate_best_per_document(fused: Vec<IndexHit>) -> Vec<IndexHit> {
    let mut seen = std::collections::HashSet::new();
    fused
        .into_iter()
        .filter(|h| seen.insert(h.document_id.clone()))
        .collect()
}

/// Greedy maximum-marginal-relevance selection. Candidate similarity is approximated by token
/// Jaccard overlap between chunk contents, since fused [`IndexHit`]s don't carry raw embedding
/// vectors downstream of the index.
fn mmr_select(candidates: Vec<IndexHit>, top_k: usize, lambda: f32) -> Vec<IndexHit> {
    if candidates.len() <= top_k {
        return candidates;
    }
    let token_sets: Vec<std::collections::HashSet<String>> = candidates
        .iter()
        .map(|h| h.content.to_lowercase().split_whitespace().map(String::from).collect())
        .collect();

    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut selected: Vec<usize> = Vec::new();

    while !remaining.is_empty() && selected.len() < top_k {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (pos, &idx) in remaining.iter().enumerate() {
            let relevance = candidates[idx].score;
            let redundancy = selected
                .iter()
                .map(|&s| jaccard(&token_sets[idx], &token_sets[s]))
                .fold(0.0_f32, f32::max);
            let mmr_score = lambda * relevance - (1.0 - lambda) * redundancy;
            if mmr_score > best_score {
                best_score = mmr_score;
                best_idx = pos;
            }
        }
        selected.push(remaining.remove(best_idx));
    }

    selected.into_iter().map(|idx| candidates[idx].clone()).collect()
}

fn jaccard(a: &std::collections::HashSet<String>, b: &std::collections::HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}
