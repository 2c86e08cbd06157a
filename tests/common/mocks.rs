//! Test doubles for the `LLMClient`, `WebSearch`, and `VectorStore` traits.
//!
//! Hand-rolled rather than `mockall`-generated: `LLMClient`'s streaming methods return
//! `Box<dyn Stream<...>>`, which `automock` does not handle cleanly over `async_trait`'s
//! desugaring. `mockall` is reserved for `MockWebSearch` below, whose trait has no streaming
//! methods and mocks cleanly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use mockall::mock;

use retrieva::llm::LLMClient;
use retrieva::types::{CoreError, Result};

/// Returns a fixed response to every call, optionally after an injected delay. Mirrors the
/// shape of `retrieva::llm::test_support::MockLLMClient`, which is `#[cfg(test)]`-gated to the
/// library's own unit tests and unreachable from here.
#[derive(Debug, Clone)]
pub struct ScriptedLLMClient {
    response: String,
    delay: Option<Duration>,
    should_fail: bool,
    calls: std::sync::Arc<AtomicUsize>,
}

impl Default for ScriptedLLMClient {
    fn default() -> Self {
        Self::new("mock response")
    }
}

impl ScriptedLLMClient {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            delay: None,
            should_fail: false,
            calls: std::sync::Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new("")
        }
    }

    pub fn with_delay(response: impl Into<String>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(response)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(CoreError::TransientUpstream("scripted failure".to_string()));
        }
        Ok(self.response.clone())
    }
}

#[async_trait]
impl LLMClient for ScriptedLLMClient {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.respond().await
    }

    async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
        self.respond().await
    }

    async fn generate_with_history(&self, _messages: &[(String, String)]) -> Result<String> {
        self.respond().await
    }

    async fn stream(
        &self,
        _prompt: &str,
    ) -> Result<Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>> {
        let resp = self.respond().await?;
        Ok(Box::new(stream::once(async { Ok(resp) })))
    }

    async fn stream_with_system(
        &self,
        _system: &str,
        _prompt: &str,
    ) -> Result<Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>> {
        let resp = self.respond().await?;
        Ok(Box::new(stream::once(async { Ok(resp) })))
    }

    async fn stream_with_history(
        &self,
        _messages: &[(String, String)],
    ) -> Result<Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>> {
        let resp = self.respond().await?;
        Ok(Box::new(stream::once(async { Ok(resp) })))
    }

    fn model_name(&self) -> &str {
        "scripted-mock"
    }
}

mock! {
    pub WebSearch {}

    #[async_trait]
    impl retrieva::tools::websearch::WebSearch for WebSearch {
        async fn search(&self, query: &str, k: usize) -> Result<Vec<retrieva::tools::websearch::SearchResult>>;
        async fn fetch(&self, url: &str) -> Result<String>;
        fn provider_name(&self) -> &'static str;
    }
}

/// Wraps an in-memory vector store and sleeps before every `search`, used to simulate a
/// stalled `LOCAL_RETRIEVE` phase without an unbounded hang.
pub struct SlowVectorStore {
    inner: retrieva::db::vectorstore::InMemoryVectorStore,
    delay: Duration,
}

impl SlowVectorStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: retrieva::db::vectorstore::InMemoryVectorStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl retrieva::db::VectorStore for SlowVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.inner.create_collection(name, dimensions).await
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.inner.collection_exists(name).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn upsert(
        &self,
        collection: &str,
        records: Vec<retrieva::db::vectorstore::VectorRecord>,
    ) -> Result<usize> {
        self.inner.upsert(collection, records).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<retrieva::db::vectorstore::VectorMatch>> {
        tokio::time::sleep(self.delay).await;
        self.inner.search(collection, embedding, limit).await
    }

    async fn delete(&self, collection: &str, document_id: &str) -> Result<usize> {
        self.inner.delete(collection, document_id).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.inner.count(collection).await
    }
}
