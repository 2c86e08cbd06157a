//! [`VectorStore`] backed by `ares-vector`, the embedded pure-Rust HNSW engine.
//!
//! One `ares-vector` collection per tenant (`"{user_id}:{space_id}"`), cosine distance, metadata
//! carrying `document_id`/`chunk_index` so a hit maps back to a [`crate::types::Chunk`].

use ares_vector::{Config, DistanceMetric, VectorDb, VectorMetadata};
use async_trait::async_trait;
use std::path::PathBuf;

use super::vectorstore::{VectorMatch, VectorRecord, VectorStore};
use crate::types::{CoreError, Result};

pub struct AresVectorStore {
    db: VectorDb,
}

impl AresVectorStore {
    pub async fn open(data_path: Option<PathBuf>) -> Result<Self> {
        let config = match data_path {
            Some(path) => Config::persistent(path),
            None => Config::memory(),
        };
        let db = VectorDb::open(config)
            .await
            .map_err(|e| CoreError::Internal(format!("opening ares-vector store: {e}")))?;
        Ok(Self { db })
    }

    fn metadata_for(record: &VectorRecord) -> VectorMetadata {
        let mut meta = VectorMetadata::new();
        meta.insert("document_id", record.document_id.clone());
        meta.insert("chunk_index", record.chunk_index as i64);
        meta
    }
}

#[async_trait]
impl VectorStore for AresVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        match self
            .db
            .create_collection(name, dimensions, DistanceMetric::Cosine)
            .await
        {
            Ok(()) => Ok(()),
            Err(ares_vector::Error::CollectionExists(_)) => Ok(()),
            Err(e) => Err(CoreError::Internal(format!("creating collection {name}: {e}"))),
        }
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.db.collection_exists(name))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        match self.db.delete_collection(name).await {
            Ok(()) | Err(ares_vector::Error::CollectionNotFound(_)) => Ok(()),
            Err(e) => Err(CoreError::Internal(format!("deleting collection {name}: {e}"))),
        }
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<usize> {
        let col = self
            .db
            .get_collection(collection)
            .map_err(|e| CoreError::NotFound(format!("collection {collection}: {e}")))?;
        let n = records.len();
        for r in &records {
            col.update(&r.id, &r.embedding, Some(Self::metadata_for(r)))
                .or_else(|_| col.insert(&r.id, &r.embedding, Some(Self::metadata_for(r))))
                .map_err(|e| CoreError::Internal(format!("upserting vector {}: {e}", r.id)))?;
        }
        Ok(n)
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorMatch>> {
        let Ok(col) = self.db.get_collection(collection) else {
            return Ok(Vec::new());
        };
        let results = col
            .search(embedding, limit)
            .map_err(|e| CoreError::Internal(format!("searching collection {collection}: {e}")))?;
        Ok(results
            .into_iter()
            .filter_map(|r| {
                let meta = r.metadata?;
                let document_id = meta.get_string("document_id")?.to_string();
                let chunk_index = meta.get_int("chunk_index")? as u32;
                Some(VectorMatch {
                    id: r.id,
                    document_id,
                    chunk_index,
                    score: r.score,
                })
            })
            .collect())
    }

    async fn delete(&self, collection: &str, document_id: &str) -> Result<usize> {
        let Ok(col) = self.db.get_collection(collection) else {
            return Ok(0);
        };
        let ids: Vec<String> = col
            .export_all()
            .into_iter()
            .filter(|(_, _, meta)| {
                meta.as_ref()
                    .and_then(|m| m.get_string("document_id"))
                    .map(|id| id == document_id)
                    .unwrap_or(false)
            })
            .map(|(id, _, _)| id)
            .collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        col.delete_batch(&refs)
            .map_err(|e| CoreError::Internal(format!("deleting document {document_id}: {e}")))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.db
            .count(collection)
            .or(Ok(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_chunk_vector() {
        let store = AresVectorStore::open(None).await.unwrap();
        store.create_collection("u1:s1", 3).await.unwrap();
        store
            .upsert(
                "u1:s1",
                vec![VectorRecord {
                    id: "d1:0".into(),
                    document_id: "d1".into(),
                    chunk_index: 0,
                    embedding: vec![1.0, 0.0, 0.0],
                }],
            )
            .await
            .unwrap();
        let hits = store.search("u1:s1", &[1.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "d1");
    }

    #[tokio::test]
    async fn delete_scopes_to_document() {
        let store = AresVectorStore::open(None).await.unwrap();
        store.create_collection("u1:s1", 2).await.unwrap();
        store
            .upsert(
                "u1:s1",
                vec![
                    VectorRecord {
                        id: "d1:0".into(),
                        document_id: "d1".into(),
                        chunk_index: 0,
                        embedding: vec![1.0, 0.0],
                    },
                    VectorRecord {
                        id: "d2:0".into(),
                        document_id: "d2".into(),
                        chunk_index: 0,
                        embedding: vec![0.0, 1.0],
                    },
                ],
            )
            .await
            .unwrap();
        let deleted = store.delete("u1:s1", "d1").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count("u1:s1").await.unwrap(), 1);
    }
}
