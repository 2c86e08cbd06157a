//! Ingestion pipeline: BlobStore → Extractor → Chunker → Embedder → MetaStore, with a
//! best-effort dual-write to SearchIndex (SPEC_FULL.md §4.H).
//!
//! No teacher module covers this; the orchestration shape (transactional MetaStore write first,
//! then a best-effort index dual-write that never rolls back the transaction on failure) is
//! grounded directly on [`crate::db::metastore::MetaStore::ingest_document`].

pub mod blob_store;
pub mod extract;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::db::metastore::MetaStore;
use crate::rag::cache::{Cache, CacheKind};
use crate::rag::chunker::TextChunker;
use crate::rag::embeddings::EmbeddingService;
use crate::rag::search_index::{IndexedChunk, IndexedImage, SearchIndex};
use crate::types::{ActivityKind, Chunk, CoreError, Document, ImageAsset, Result, SourceType};

use blob_store::{sanitize_tenant, BlobStore};
use extract::Extractor;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Result of a single `Ingestor::ingest` call.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub document: Document,
    pub chunk_count: usize,
    pub image_count: usize,
    /// Set if the best-effort SearchIndex dual-write failed; MetaStore was still committed.
    pub index_warning: Option<String>,
}

pub struct Ingestor {
    blob_store: Arc<dyn BlobStore>,
    extractor: Extractor,
    chunker: TextChunker,
    embeddings: Arc<EmbeddingService>,
    metastore: Arc<MetaStore>,
    search_index: Arc<SearchIndex>,
    cache: Arc<Cache>,
}

impl Ingestor {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        extractor: Extractor,
        chunker: TextChunker,
        embeddings: Arc<EmbeddingService>,
        metastore: Arc<MetaStore>,
        search_index: Arc<SearchIndex>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            blob_store,
            extractor,
            chunker,
            embeddings,
            metastore,
            search_index,
            cache,
        }
    }

    /// Runs the full ingestion algorithm for one file. Internally sequential; callers may invoke
    /// this concurrently across files/requests.
    pub async fn ingest(
        &self,
        user_id: &str,
        user_email: &str,
        space_id: &str,
        file_name: &str,
        source_type: SourceType,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome> {
        let now = Utc::now();
        let tenant = sanitize_tenant(user_email);
        let relative_path = blob_relative_path(file_name, now);

        let blob_url = retry(RETRY_ATTEMPTS, || {
            self.blob_store.put(&tenant, &relative_path, &bytes)
        })
        .await?;

        let extracted = self.extractor.extract(source_type, file_name, &bytes)?;

        let pieces = self.chunker.chunk(&extracted.normalized_text);
        let vectors = if pieces.is_empty() {
            Vec::new()
        } else {
            retry(RETRY_ATTEMPTS, || self.embeddings.embed_text_batch(&pieces)).await?
        };

        let doc_id = Uuid::new_v4().to_string();
        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .zip(vectors.into_iter())
            .enumerate()
            .map(|(index, (content, embedding))| Chunk {
                id: Uuid::new_v4().to_string(),
                document_id: doc_id.clone(),
                chunk_index: index as u32,
                char_count: content.chars().count() as u32,
                content,
                embedding: Some(embedding),
                created_at: now,
            })
            .collect();

        let mut images = Vec::with_capacity(extracted.images.len());
        for extracted_image in extracted.images {
            let embedding = match self.embeddings.embed_image(&extracted_image.bytes).await {
                Ok(v) => Some(v),
                Err(CoreError::Unsupported(_)) => None,
                Err(e) => {
                    tracing::warn!(error = %e, document_id = %doc_id, "image embedding failed, storing without a vector");
                    None
                }
            };
            let image_id = Uuid::new_v4().to_string();
            let image_relative_path = format!("images/{image_id}.bin");
            retry(RETRY_ATTEMPTS, || {
                self.blob_store.put(&tenant, &image_relative_path, &extracted_image.bytes)
            })
            .await?;
            let file_path = format!("{tenant}/{image_relative_path}");
            images.push(ImageAsset {
                id: image_id,
                document_id: doc_id.clone(),
                user_id: user_id.to_string(),
                file_path,
                thumbnail_path: None,
                caption: extracted_image.caption,
                caption_source: extracted_image.caption_source,
                ocr_text: extracted_image.ocr_text,
                tags: extracted_image.tags,
                embedding,
                native_width: extracted_image.native_width,
                native_height: extracted_image.native_height,
                created_at: now,
            });
        }

        let document = Document {
            id: doc_id,
            user_id: user_id.to_string(),
            space_id: space_id.to_string(),
            source_type,
            file_name: file_name.to_string(),
            blob_url: Some(blob_url),
            metadata: extracted.metadata,
            created_at: now,
        };

        self.metastore.ingest_document(&document, &chunks, &images).await?;

        let index_warning = match self.index_for_search(&document, &chunks, &images).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e, document_id = %document.id, "search index dual-write failed; metastore write stands");
                Some(e.to_string())
            }
        };

        self.cache.bump(user_id, space_id, CacheKind::Text);
        if !images.is_empty() {
            self.cache.bump(user_id, space_id, CacheKind::Image);
        }

        self.metastore
            .record_activity(
                user_id,
                ActivityKind::Upload,
                serde_json::json!({
                    "document_id": document.id,
                    "file_name": document.file_name,
                    "chunk_count": chunks.len(),
                    "image_count": images.len(),
                }),
            )
            .await?;

        Ok(IngestOutcome {
            chunk_count: chunks.len(),
            image_count: images.len(),
            document,
            index_warning,
        })
    }

    async fn index_for_search(&self, document: &Document, chunks: &[Chunk], images: &[ImageAsset]) -> Result<()> {
        let indexed: Vec<IndexedChunk> = chunks
            .iter()
            .filter_map(|chunk| {
                Some(IndexedChunk {
                    document_id: document.id.clone(),
                    chunk_index: chunk.chunk_index,
                    text: chunk.content.clone(),
                    file_name: document.file_name.clone(),
                    title: None,
                    source_type: document.source_type,
                    user_id: document.user_id.clone(),
                    space_id: document.space_id.clone(),
                    created_at: chunk.created_at,
                    embedding: chunk.embedding.clone()?,
                })
            })
            .collect();
        if !indexed.is_empty() {
            retry(RETRY_ATTEMPTS, || self.search_index.bulk_index_chunks(&indexed)).await?;
        }

        let indexed_images: Vec<IndexedImage> = images
            .iter()
            .filter_map(|image| {
                Some(IndexedImage {
                    document_id: document.id.clone(),
                    image_id: image.id.clone(),
                    caption: image.caption.clone(),
                    ocr_text: image.ocr_text.clone(),
                    tags: image.tags.clone(),
                    file_name: document.file_name.clone(),
                    user_id: document.user_id.clone(),
                    space_id: document.space_id.clone(),
                    created_at: image.created_at,
                    embedding: image.embedding.clone()?,
                })
            })
            .collect();
        if !indexed_images.is_empty() {
            retry(RETRY_ATTEMPTS, || self.search_index.bulk_index_images(&indexed_images)).await?;
        }

        Ok(())
    }
}

/// The `YYYY/MM/DD/HHMMSS/{file}` portion of a blob path; the tenant segment is prepended
/// separately by [`BlobStore::put`] (SPEC_FULL.md §4.H).
fn blob_relative_path(file_name: &str, now: chrono::DateTime<Utc>) -> String {
    format!("{}/{}", now.format("%Y/%m/%d/%H%M%S"), file_name)
}

/// Bounded exponential backoff: retries only [`CoreError::TransientUpstream`], doubling the
/// delay each attempt, up to `attempts` tries total.
async fn retry<F, Fut, T>(attempts: u32, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut last_err = None;
    for attempt in 0..attempts.max(1) {
        match f().await {
            Ok(v) => return Ok(v),
            Err(CoreError::TransientUpstream(msg)) => {
                last_err = Some(CoreError::TransientUpstream(msg));
                if attempt + 1 < attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| CoreError::Internal("retry exhausted with no recorded error".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn blob_relative_path_matches_layout() {
        let now = chrono::DateTime::parse_from_rfc3339("2026-07-26T14:32:10Z")
            .unwrap()
            .with_timezone(&Utc);
        let path = blob_relative_path("report.pdf", now);
        assert_eq!(path, "2026/07/26/143210/report.pdf");
    }

    #[tokio::test]
    async fn retry_gives_up_after_exhausting_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CoreError::TransientUpstream("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_does_not_retry_non_transient_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CoreError::Validation("bad input".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry(3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CoreError::TransientUpstream("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }
}
