//! Vector store abstraction over the embedded ANN backend.
//!
//! A collection corresponds to one `(user_id, space_id)` tenant; callers never cross this
//! boundary from outside [`crate::rag::search_index`]. Each record's `id` is
//! `"{document_id}:{chunk_index}"` so a point maps back to a [`crate::types::Chunk`] without a
//! second lookup.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{CoreError, Result};

/// One indexed vector, associated with its chunk coordinates.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub document_id: String,
    pub chunk_index: u32,
    pub embedding: Vec<f32>,
}

/// A scored match returned from [`VectorStore::search`].
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    pub document_id: String,
    pub chunk_index: u32,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;
    async fn collection_exists(&self, name: &str) -> Result<bool>;
    async fn delete_collection(&self, name: &str) -> Result<()>;
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<usize>;
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorMatch>>;
    async fn delete(&self, collection: &str, document_id: &str) -> Result<usize>;
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// In-memory, linear-scan vector store used by tests and as a fallback when `ares-vector` is
/// not the configured backend. Cosine similarity, no approximation.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: Arc<RwLock<HashMap<String, InMemoryCollection>>>,
}

#[derive(Default)]
struct InMemoryCollection {
    dimensions: usize,
    records: HashMap<String, VectorRecord>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            0.0
        } else {
            dot / (na * nb)
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.collections
            .write()
            .entry(name.to_string())
            .or_insert_with(|| InMemoryCollection {
                dimensions,
                records: HashMap::new(),
            });
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().contains_key(name))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<usize> {
        let mut collections = self.collections.write();
        let col = collections
            .entry(collection.to_string())
            .or_insert_with(|| InMemoryCollection {
                dimensions: records.first().map(|r| r.embedding.len()).unwrap_or(0),
                records: HashMap::new(),
            });
        let n = records.len();
        for r in records {
            if r.embedding.len() != col.dimensions && col.dimensions != 0 {
                return Err(CoreError::Validation(format!(
                    "embedding dimension {} does not match collection dimension {}",
                    r.embedding.len(),
                    col.dimensions
                )));
            }
            col.records.insert(r.id.clone(), r);
        }
        Ok(n)
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorMatch>> {
        let collections = self.collections.read();
        let Some(col) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<VectorMatch> = col
            .records
            .values()
            .map(|r| VectorMatch {
                id: r.id.clone(),
                document_id: r.document_id.clone(),
                chunk_index: r.chunk_index,
                score: Self::cosine(embedding, &r.embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn delete(&self, collection: &str, document_id: &str) -> Result<usize> {
        let mut collections = self.collections.write();
        let Some(col) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = col.records.len();
        col.records.retain(|_, r| r.document_id != document_id);
        Ok(before - col.records.len())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|c| c.records.len())
            .unwrap_or(0))
    }
}
