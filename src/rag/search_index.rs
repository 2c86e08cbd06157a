//! Derived, rebuildable lexical + vector index over chunks and images (SPEC_FULL.md §4.E).
//!
//! MetaStore is authoritative; everything here can be thrown away and rebuilt with
//! [`SearchIndex::reindex_tenant`]. Tenant isolation is structural: every lexical index and every
//! `ares-vector` collection is keyed by `"{user_id}:{space_id}"`, never shared across tenants.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::db::vectorstore::{VectorRecord, VectorStore};
use crate::types::{CoreError, Result, SourceType};

const TEXT_BOOST_REPEAT: usize = 1;
const FILE_NAME_BOOST_REPEAT: usize = 2;
const TITLE_BOOST_REPEAT: usize = 3; // round(2.5)

/// One chunk ready to be indexed. Produced by the Ingestor, consumed by [`SearchIndex::bulk_index_chunks`].
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub document_id: String,
    pub chunk_index: u32,
    pub text: String,
    pub file_name: String,
    pub title: Option<String>,
    pub source_type: SourceType,
    pub user_id: String,
    pub space_id: String,
    pub created_at: DateTime<Utc>,
    pub embedding: Vec<f32>,
}

/// One image asset ready to be indexed.
#[derive(Debug, Clone)]
pub struct IndexedImage {
    pub document_id: String,
    pub image_id: String,
    pub caption: Option<String>,
    pub ocr_text: Option<String>,
    pub tags: Vec<String>,
    pub file_name: String,
    pub user_id: String,
    pub space_id: String,
    pub created_at: DateTime<Utc>,
    pub embedding: Vec<f32>,
}

/// A single match out of either `lexical_search` or `knn_search`, before RRF fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHit {
    pub document_id: String,
    pub chunk_index: u32,
    pub content: String,
    pub file_name: String,
    pub user_id: String,
    pub space_id: String,
    pub created_at: DateTime<Utc>,
    /// Min-max normalized to `[0, 1]` per call (SPEC_FULL.md §4.E).
    pub score: f32,
}

/// Optional recency decay applied on top of a raw score.
#[derive(Debug, Clone, Copy)]
pub struct RecencyDecay {
    pub scale_days: f64,
    pub weight: f32,
}

impl RecencyDecay {
    fn apply(&self, score: f32, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        let age_days = (now - created_at).num_seconds() as f64 / 86_400.0;
        let decay = (-(age_days * age_days) / (2.0 * self.scale_days * self.scale_days)).exp() as f32;
        score * (1.0 - self.weight) + score * decay * self.weight
    }
}

#[derive(Debug, Clone, Default)]
struct IndexedRecord {
    document_id: String,
    chunk_index: u32,
    content: String,
    file_name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct IndexedImageRecord {
    document_id: String,
    image_id: String,
    caption: Option<String>,
    ocr_text: Option<String>,
    tags: Vec<String>,
    file_name: String,
    created_at: DateTime<Utc>,
}

/// A single image match out of either `image_lexical_search` or `image_knn_search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageIndexHit {
    pub document_id: String,
    pub image_id: String,
    pub file_name: String,
    pub caption: Option<String>,
    pub ocr_text: Option<String>,
    pub tags: Vec<String>,
    pub user_id: String,
    pub space_id: String,
    pub created_at: DateTime<Utc>,
    pub score: f32,
}

fn tenant_key(user_id: &str, space_id: &str) -> String {
    format!("{user_id}:{space_id}")
}

fn record_key(document_id: &str, chunk_index: u32) -> String {
    format!("{document_id}:{chunk_index}")
}

fn boosted_document(text: &str, file_name: &str, title: Option<&str>) -> String {
    let mut composed = String::with_capacity(text.len() + 64);
    if let Some(title) = title {
        for _ in 0..TITLE_BOOST_REPEAT {
            composed.push_str(title);
            composed.push(' ');
        }
    }
    for _ in 0..FILE_NAME_BOOST_REPEAT {
        composed.push_str(file_name);
        composed.push(' ');
    }
    for _ in 0..TEXT_BOOST_REPEAT {
        composed.push_str(text);
        composed.push(' ');
    }
    composed
}

/// Min-max normalize scores to `[0, 1]`. Passes scores through unchanged when there are fewer
/// than 2 results, since a single score has no meaningful range (Open Question #2).
pub fn normalize_scores(scores: &mut [f32]) {
    if scores.len() < 2 {
        return;
    }
    let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if range <= f32::EPSILON {
        for s in scores.iter_mut() {
            *s = 1.0;
        }
        return;
    }
    for s in scores.iter_mut() {
        *s = (*s - min) / range;
    }
}

/// BM25 index over one tenant's chunk or image text.
///
/// `k1=1.2, b=0.75` (unchanged from the teacher's BM25 implementation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Index {
    documents: HashMap<String, Vec<String>>,
    inverted_index: HashMap<String, HashSet<String>>,
    document_frequencies: HashMap<String, usize>,
    doc_count: usize,
    avg_doc_length: f32,
    k1: f32,
    b: f32,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self {
            documents: HashMap::new(),
            inverted_index: HashMap::new(),
            document_frequencies: HashMap::new(),
            doc_count: 0,
            avg_doc_length: 0.0,
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty() && s.len() > 1)
            .map(String::from)
            .collect()
    }

    pub fn add_document(&mut self, id: &str, content: &str) {
        let tokens = Self::tokenize(content);
        let unique_terms: HashSet<_> = tokens.iter().cloned().collect();
        for term in &unique_terms {
            *self.document_frequencies.entry(term.clone()).or_insert(0) += 1;
            self.inverted_index.entry(term.clone()).or_default().insert(id.to_string());
        }
        self.documents.insert(id.to_string(), tokens);
        self.doc_count += 1;
        let total_tokens: usize = self.documents.values().map(|v| v.len()).sum();
        self.avg_doc_length = total_tokens as f32 / self.doc_count as f32;
    }

    pub fn remove_document(&mut self, id: &str) {
        if let Some(tokens) = self.documents.remove(id) {
            let unique_terms: HashSet<_> = tokens.into_iter().collect();
            for term in unique_terms {
                if let Some(df) = self.document_frequencies.get_mut(&term) {
                    *df = df.saturating_sub(1);
                    if *df == 0 {
                        self.document_frequencies.remove(&term);
                    }
                }
                if let Some(docs) = self.inverted_index.get_mut(&term) {
                    docs.remove(id);
                    if docs.is_empty() {
                        self.inverted_index.remove(&term);
                    }
                }
            }
            self.doc_count = self.doc_count.saturating_sub(1);
            if self.doc_count > 0 {
                let total_tokens: usize = self.documents.values().map(|v| v.len()).sum();
                self.avg_doc_length = total_tokens as f32 / self.doc_count as f32;
            } else {
                self.avg_doc_length = 0.0;
            }
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let df = self.document_frequencies.get(term).copied().unwrap_or(0) as f32;
        let n = self.doc_count as f32;
        if df == 0.0 || n == 0.0 {
            return 0.0;
        }
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score_document(&self, doc_id: &str, query_terms: &[String]) -> f32 {
        let Some(doc_tokens) = self.documents.get(doc_id) else {
            return 0.0;
        };
        let doc_len = doc_tokens.len() as f32;
        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        for token in doc_tokens {
            *term_freq.entry(token.as_str()).or_insert(0) += 1;
        }
        let mut score = 0.0;
        for term in query_terms {
            let tf = term_freq.get(term.as_str()).copied().unwrap_or(0) as f32;
            let idf = self.idf(term);
            let numerator = tf * (self.k1 + 1.0);
            let denominator = tf + self.k1 * (1.0 - self.b + self.b * doc_len / self.avg_doc_length);
            score += idf * numerator / denominator;
        }
        score
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f32)> {
        let query_terms = Self::tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }
        let mut candidates: HashSet<String> = HashSet::new();
        for term in &query_terms {
            if let Some(docs) = self.inverted_index.get(term) {
                candidates.extend(docs.iter().cloned());
            }
        }
        let mut results: Vec<(String, f32)> = candidates
            .iter()
            .map(|id| (id.clone(), self.score_document(id, &query_terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        results
    }

    pub fn is_empty(&self) -> bool {
        self.doc_count == 0
    }
}

/// Lexical + vector index over one tenant's chunks and images.
pub struct SearchIndex {
    vector_store: Arc<dyn VectorStore>,
    chunk_lexical: RwLock<HashMap<String, Bm25Index>>,
    image_lexical: RwLock<HashMap<String, Bm25Index>>,
    chunk_records: RwLock<HashMap<String, HashMap<String, IndexedRecord>>>,
    image_records: RwLock<HashMap<String, HashMap<String, IndexedImageRecord>>>,
    dimensions: usize,
    image_dimensions: usize,
}

impl SearchIndex {
    pub fn new(vector_store: Arc<dyn VectorStore>, dimensions: usize, image_dimensions: usize) -> Self {
        Self {
            vector_store,
            chunk_lexical: RwLock::new(HashMap::new()),
            image_lexical: RwLock::new(HashMap::new()),
            chunk_records: RwLock::new(HashMap::new()),
            image_records: RwLock::new(HashMap::new()),
            dimensions,
            image_dimensions,
        }
    }

    fn chunk_collection(tenant: &str) -> String {
        format!("{tenant}:chunks")
    }

    fn image_collection(tenant: &str) -> String {
        format!("{tenant}:images")
    }

    /// Idempotent: ensures the `ares-vector` collections for a tenant exist with the configured
    /// dimensionality. Fails with [`CoreError::Validation`] if called again with a different
    /// dimension than the one the store was constructed with.
    pub async fn ensure_indexes(&self, user_id: &str, space_id: &str) -> Result<()> {
        let tenant = tenant_key(user_id, space_id);
        self.vector_store
            .create_collection(&Self::chunk_collection(&tenant), self.dimensions)
            .await?;
        self.vector_store
            .create_collection(&Self::image_collection(&tenant), self.image_dimensions)
            .await?;
        Ok(())
    }

    /// Index chunks belonging to one document. All-or-nothing for this document: on any
    /// embedding-dimension mismatch the whole call fails and nothing is applied.
    pub async fn bulk_index_chunks(&self, chunks: &[IndexedChunk]) -> Result<()> {
        let Some(first) = chunks.first() else {
            return Ok(());
        };
        let tenant = tenant_key(&first.user_id, &first.space_id);
        self.ensure_indexes(&first.user_id, &first.space_id).await?;

        for chunk in chunks {
            if chunk.embedding.len() != self.dimensions {
                return Err(CoreError::Validation(format!(
                    "chunk embedding dimension {} does not match index dimension {}",
                    chunk.embedding.len(),
                    self.dimensions
                )));
            }
        }

        let records: Vec<VectorRecord> = chunks
            .iter()
            .map(|c| VectorRecord {
                id: record_key(&c.document_id, c.chunk_index),
                document_id: c.document_id.clone(),
                chunk_index: c.chunk_index,
                embedding: c.embedding.clone(),
            })
            .collect();
        self.vector_store.upsert(&Self::chunk_collection(&tenant), records).await?;

        let mut lexical = self.chunk_lexical.write();
        let index = lexical.entry(tenant.clone()).or_default();
        let mut records_guard = self.chunk_records.write();
        let tenant_records = records_guard.entry(tenant).or_default();
        for chunk in chunks {
            let key = record_key(&chunk.document_id, chunk.chunk_index);
            let composed = boosted_document(&chunk.text, &chunk.file_name, chunk.title.as_deref());
            index.add_document(&key, &composed);
            tenant_records.insert(
                key,
                IndexedRecord {
                    document_id: chunk.document_id.clone(),
                    chunk_index: chunk.chunk_index,
                    content: chunk.text.clone(),
                    file_name: chunk.file_name.clone(),
                    created_at: chunk.created_at,
                },
            );
        }
        Ok(())
    }

    pub async fn bulk_index_images(&self, images: &[IndexedImage]) -> Result<()> {
        let Some(first) = images.first() else {
            return Ok(());
        };
        let tenant = tenant_key(&first.user_id, &first.space_id);
        self.ensure_indexes(&first.user_id, &first.space_id).await?;

        for image in images {
            if image.embedding.len() != self.image_dimensions {
                return Err(CoreError::Validation(format!(
                    "image embedding dimension {} does not match index dimension {}",
                    image.embedding.len(),
                    self.image_dimensions
                )));
            }
        }

        let records: Vec<VectorRecord> = images
            .iter()
            .map(|img| VectorRecord {
                id: img.image_id.clone(),
                document_id: img.document_id.clone(),
                chunk_index: 0,
                embedding: img.embedding.clone(),
            })
            .collect();
        self.vector_store.upsert(&Self::image_collection(&tenant), records).await?;

        let mut lexical = self.image_lexical.write();
        let index = lexical.entry(tenant.clone()).or_default();
        let mut records_guard = self.image_records.write();
        let tenant_records = records_guard.entry(tenant).or_default();
        for image in images {
            let mut text = String::new();
            if let Some(caption) = &image.caption {
                text.push_str(caption);
                text.push(' ');
            }
            if let Some(ocr) = &image.ocr_text {
                text.push_str(ocr);
                text.push(' ');
            }
            text.push_str(&image.tags.join(" "));
            index.add_document(&image.image_id, &boosted_document(&text, &image.file_name, None));
            tenant_records.insert(
                image.image_id.clone(),
                IndexedImageRecord {
                    document_id: image.document_id.clone(),
                    image_id: image.image_id.clone(),
                    caption: image.caption.clone(),
                    ocr_text: image.ocr_text.clone(),
                    tags: image.tags.clone(),
                    file_name: image.file_name.clone(),
                    created_at: image.created_at,
                },
            );
        }
        Ok(())
    }

    fn hydrate_images(
        &self,
        tenant: &str,
        user_id: &str,
        space_id: &str,
        raw: Vec<(String, f32)>,
        tags: &[String],
    ) -> Vec<ImageIndexHit> {
        let records = self.image_records.read();
        let Some(tenant_records) = records.get(tenant) else {
            return Vec::new();
        };
        let mut hits: Vec<ImageIndexHit> = raw
            .into_iter()
            .filter_map(|(key, score)| {
                let record = tenant_records.get(&key)?;
                if !tags.is_empty() && !tags.iter().any(|t| record.tags.contains(t)) {
                    return None;
                }
                Some(ImageIndexHit {
                    document_id: record.document_id.clone(),
                    image_id: record.image_id.clone(),
                    file_name: record.file_name.clone(),
                    caption: record.caption.clone(),
                    ocr_text: record.ocr_text.clone(),
                    tags: record.tags.clone(),
                    user_id: user_id.to_string(),
                    space_id: space_id.to_string(),
                    created_at: record.created_at,
                    score,
                })
            })
            .collect();
        let mut scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
        normalize_scores(&mut scores);
        for (hit, score) in hits.iter_mut().zip(scores) {
            hit.score = score;
        }
        hits
    }

    /// Tokenized match over caption/OCR text/tags with a file-name boost, optionally filtered to
    /// images carrying at least one of `tags`.
    pub fn image_lexical_search(
        &self,
        user_id: &str,
        space_id: &str,
        query: &str,
        top_k: usize,
        tags: &[String],
    ) -> Vec<ImageIndexHit> {
        let tenant = tenant_key(user_id, space_id);
        let lexical = self.image_lexical.read();
        let Some(index) = lexical.get(&tenant) else {
            return Vec::new();
        };
        let raw = index.search(query, top_k);
        drop(lexical);
        self.hydrate_images(&tenant, user_id, space_id, raw, tags)
    }

    /// Cosine KNN over the tenant's image vectors, optionally filtered to images carrying at
    /// least one of `tags`.
    pub async fn image_knn_search(
        &self,
        user_id: &str,
        space_id: &str,
        vector: &[f32],
        top_k: usize,
        tags: &[String],
    ) -> Result<Vec<ImageIndexHit>> {
        let tenant = tenant_key(user_id, space_id);
        let matches = self
            .vector_store
            .search(&Self::image_collection(&tenant), vector, top_k)
            .await?;
        let raw: Vec<(String, f32)> = matches.into_iter().map(|m| (m.id, m.score)).collect();
        Ok(self.hydrate_images(&tenant, user_id, space_id, raw, tags))
    }

    /// All images in a tenant carrying at least one of `tags`, most recent first. Used when
    /// `/image-search` is called with tags only (no `query`/`vector`).
    pub fn images_by_tags(&self, user_id: &str, space_id: &str, tags: &[String], top_k: usize) -> Vec<ImageIndexHit> {
        let tenant = tenant_key(user_id, space_id);
        let records = self.image_records.read();
        let Some(tenant_records) = records.get(&tenant) else {
            return Vec::new();
        };
        let mut hits: Vec<ImageIndexHit> = tenant_records
            .values()
            .filter(|r| tags.is_empty() || tags.iter().any(|t| r.tags.contains(t)))
            .map(|record| ImageIndexHit {
                document_id: record.document_id.clone(),
                image_id: record.image_id.clone(),
                file_name: record.file_name.clone(),
                caption: record.caption.clone(),
                ocr_text: record.ocr_text.clone(),
                tags: record.tags.clone(),
                user_id: user_id.to_string(),
                space_id: space_id.to_string(),
                created_at: record.created_at,
                score: 1.0,
            })
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits.truncate(top_k);
        hits
    }

    /// Tokenized match over text/title/file_name with field boosts, min-max normalized.
    pub fn lexical_search(
        &self,
        user_id: &str,
        space_id: &str,
        query: &str,
        top_k: usize,
        decay: Option<RecencyDecay>,
    ) -> Vec<IndexHit> {
        let tenant = tenant_key(user_id, space_id);
        let lexical = self.chunk_lexical.read();
        let Some(index) = lexical.get(&tenant) else {
            return Vec::new();
        };
        let raw = index.search(query, top_k);
        drop(lexical);
        self.hydrate(&tenant, user_id, space_id, raw, decay)
    }

    /// Cosine KNN over the tenant's chunk vectors, min-max normalized.
    pub async fn knn_search(
        &self,
        user_id: &str,
        space_id: &str,
        vector: &[f32],
        top_k: usize,
        decay: Option<RecencyDecay>,
    ) -> Result<Vec<IndexHit>> {
        let tenant = tenant_key(user_id, space_id);
        let matches = self
            .vector_store
            .search(&Self::chunk_collection(&tenant), vector, top_k)
            .await?;
        let raw: Vec<(String, f32)> = matches
            .into_iter()
            .map(|m| (record_key(&m.document_id, m.chunk_index), m.score))
            .collect();
        Ok(self.hydrate(&tenant, user_id, space_id, raw, decay))
    }

    fn hydrate(
        &self,
        tenant: &str,
        user_id: &str,
        space_id: &str,
        raw: Vec<(String, f32)>,
        decay: Option<RecencyDecay>,
    ) -> Vec<IndexHit> {
        let records = self.chunk_records.read();
        let Some(tenant_records) = records.get(tenant) else {
            return Vec::new();
        };
        let now = Utc::now();
        let mut hits: Vec<IndexHit> = raw
            .into_iter()
            .filter_map(|(key, score)| {
                let record = tenant_records.get(&key)?;
                let score = match decay {
                    Some(d) => d.apply(score, record.created_at, now),
                    None => score,
                };
                Some(IndexHit {
                    document_id: record.document_id.clone(),
                    chunk_index: record.chunk_index,
                    content: record.content.clone(),
                    file_name: record.file_name.clone(),
                    user_id: user_id.to_string(),
                    space_id: space_id.to_string(),
                    created_at: record.created_at,
                    score,
                })
            })
            .collect();
        let mut scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
        normalize_scores(&mut scores);
        for (hit, score) in hits.iter_mut().zip(scores) {
            hit.score = score;
        }
        hits
    }

    /// Remove every chunk and image belonging to `document_id` from both the lexical and vector
    /// indexes.
    pub async fn delete_document(&self, user_id: &str, space_id: &str, document_id: &str) -> Result<()> {
        let tenant = tenant_key(user_id, space_id);
        self.vector_store
            .delete(&Self::chunk_collection(&tenant), document_id)
            .await?;
        self.vector_store
            .delete(&Self::image_collection(&tenant), document_id)
            .await?;

        let mut records = self.chunk_records.write();
        if let Some(tenant_records) = records.get_mut(&tenant) {
            let keys: Vec<String> = tenant_records
                .values()
                .filter(|r| r.document_id == document_id)
                .map(|r| record_key(&r.document_id, r.chunk_index))
                .collect();
            let mut lexical = self.chunk_lexical.write();
            if let Some(index) = lexical.get_mut(&tenant) {
                for key in &keys {
                    index.remove_document(key);
                }
            }
            for key in &keys {
                tenant_records.remove(key);
            }
        }
        drop(records);

        let mut image_records = self.image_records.write();
        if let Some(tenant_records) = image_records.get_mut(&tenant) {
            let keys: Vec<String> = tenant_records
                .values()
                .filter(|r| r.document_id == document_id)
                .map(|r| r.image_id.clone())
                .collect();
            let mut lexical = self.image_lexical.write();
            if let Some(index) = lexical.get_mut(&tenant) {
                for key in &keys {
                    index.remove_document(key);
                }
            }
            for key in &keys {
                tenant_records.remove(key);
            }
        }
        Ok(())
    }
}
