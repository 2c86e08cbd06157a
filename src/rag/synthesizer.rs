//! Single-shot RAG answer synthesis (SPEC_FULL.md §4.J).
//!
//! Builds a deduplicated, whitespace-normalized context block from retrieved hits, calls the
//! Generator with a strict grounding prompt, and caches the answer under a hash of the query,
//! hit sequence, context, and model id.

use std::collections::HashSet;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::llm::LLMClient;
use crate::rag::cache::Cache;
use crate::types::{Hit, Result};

/// The system prompt every synthesis call is grounded with (SPEC_FULL.md §4.J, step 4).
pub const GUARDRAIL_SYSTEM_PROMPT: &str = "Answer directly from the provided context. If insufficient, say 'No answer found in the provided context.' Do not ask for more input.";

const DEFAULT_CACHE_TTL_SECONDS: u64 = 900;

#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    pub cache_ttl_seconds: u64,
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            model_id: "default".to_string(),
            max_tokens: 512,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SynthesisResult {
    pub answer: String,
    pub context_used: bool,
}

pub struct Synthesizer {
    generator: Arc<dyn LLMClient>,
    cache: Arc<Cache>,
    config: SynthesizerConfig,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn LLMClient>, cache: Arc<Cache>, config: SynthesizerConfig) -> Self {
        Self { generator, cache, config }
    }

    fn normalize_query(query: &str) -> String {
        query.trim().to_lowercase()
    }

    /// Deduplicate by `(document_id, chunk_index)`, keeping the first (best-scored) occurrence;
    /// callers pass hits already ranked best-first.
    fn dedupe_hits(hits: &[Hit]) -> Vec<&Hit> {
        let mut seen: HashSet<(String, u32)> = HashSet::new();
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let key = (hit.document_id.clone(), hit.chunk_index);
            if seen.insert(key) {
                out.push(hit);
            }
        }
        out
    }

    /// Collapse internal whitespace runs to single spaces, but preserve blank-line paragraph
    /// boundaries.
    fn normalize_whitespace(text: &str) -> String {
        text.split("\n\n")
            .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|para| !para.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn build_context(hits: &[&Hit]) -> String {
        hits.iter()
            .enumerate()
            .map(|(i, hit)| {
                let label = if hit.file_name.is_empty() {
                    format!("[Document {}]", i + 1)
                } else {
                    format!("[{}]", hit.file_name)
                };
                format!("{label}\n{}", Self::normalize_whitespace(&hit.content))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn cache_key(&self, normalized_query: &str, hits: &[&Hit], context: &str) -> String {
        let hit_sequence: String = hits
            .iter()
            .map(|h| format!("{}:{}", h.document_id, h.chunk_index))
            .collect::<Vec<_>>()
            .join(",");
        let mut hasher = Sha256::new();
        for part in [normalized_query, &hit_sequence, context, self.config.model_id.as_str()] {
            hasher.update(part.as_bytes());
            hasher.update(b"\0");
        }
        format!("synth:{:x}", hasher.finalize())
    }

    /// Synthesize an answer from `query` and already-retrieved `hits` (best-first).
    pub async fn synthesize(&self, user_id: &str, space_id: &str, query: &str, hits: &[Hit]) -> Result<SynthesisResult> {
        let normalized_query = Self::normalize_query(query);
        let deduped = Self::dedupe_hits(hits);

        if deduped.is_empty() {
            return Ok(SynthesisResult {
                answer: "No answer found in the provided context.".to_string(),
                context_used: false,
            });
        }

        let context = Self::build_context(&deduped);
        let key = self.cache_key(&normalized_query, &deduped, &context);

        if let Some(cached) = self.cache.get(&key) {
            if let Ok(result) = serde_json::from_value::<SynthesisResult>(cached) {
                return Ok(result);
            }
        }

        let prompt = format!(
            "Context:\n{context}\n\nQuestion: {query}\n\nAnswer using only the context above."
        );
        let answer = self
            .generator
            .generate_with_system(GUARDRAIL_SYSTEM_PROMPT, &prompt)
            .await?;

        let result = SynthesisResult {
            answer,
            context_used: true,
        };

        // user_id/space_id are part of the request but the cache key is already
        // content-addressed via the hit sequence, which is itself tenant-scoped
        // (hits only ever come from that tenant's retrieval).
        let _ = (user_id, space_id);
        self.cache.set(
            &key,
            serde_json::to_value(&result).unwrap_or(serde_json::Value::Null),
            Some(std::time::Duration::from_secs(self.config.cache_ttl_seconds)),
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use futures::Stream;

    struct EchoGenerator;

    #[async_trait]
    impl LLMClient for EchoGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("echo: {prompt}"))
        }
        async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
            Ok(format!("grounded-answer-for[{prompt}]"))
        }
        async fn generate_with_history(&self, _messages: &[(String, String)]) -> Result<String> {
            Ok(String::new())
        }
        async fn stream(&self, _prompt: &str) -> Result<Box<dyn Stream<Item = Result<String>> + Send + Unpin>> {
            unimplemented!()
        }
        async fn stream_with_system(
            &self,
            _system: &str,
            _prompt: &str,
        ) -> Result<Box<dyn Stream<Item = Result<String>> + Send + Unpin>> {
            unimplemented!()
        }
        async fn stream_with_history(
            &self,
            _messages: &[(String, String)],
        ) -> Result<Box<dyn Stream<Item = Result<String>> + Send + Unpin>> {
            unimplemented!()
        }
        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn sample_hit(document_id: &str, chunk_index: u32, content: &str) -> Hit {
        Hit {
            document_id: document_id.to_string(),
            chunk_index,
            content: content.to_string(),
            file_name: format!("{document_id}.txt"),
            user_id: "u1".to_string(),
            space_id: "s1".to_string(),
            score: 1.0,
            created_at: Utc::now(),
        }
    }

    fn synthesizer() -> Synthesizer {
        Synthesizer::new(
            Arc::new(EchoGenerator),
            Arc::new(Cache::with_defaults()),
            SynthesizerConfig::default(),
        )
    }

    #[tokio::test]
    async fn empty_hits_yield_no_answer_found_without_calling_generator() {
        let synth = synthesizer();
        let result = synth.synthesize("u1", "s1", "what is x?", &[]).await.unwrap();
        assert!(!result.context_used);
        assert_eq!(result.answer, "No answer found in the provided context.");
    }

    #[tokio::test]
    async fn duplicate_chunks_are_deduplicated_before_context_assembly() {
        let synth = synthesizer();
        let hits = vec![
            sample_hit("doc1", 0, "first chunk text"),
            sample_hit("doc1", 0, "stale duplicate text"),
            sample_hit("doc2", 0, "second chunk text"),
        ];
        let deduped = Synthesizer::dedupe_hits(&hits);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].content, "first chunk text");
    }

    #[tokio::test]
    async fn whitespace_is_normalized_but_paragraphs_preserved() {
        let text = "line one   \n  line two\n\nsecond   paragraph";
        let normalized = Synthesizer::normalize_whitespace(text);
        assert_eq!(normalized, "line one line two\n\nsecond paragraph");
    }

    #[tokio::test]
    async fn repeated_calls_with_identical_inputs_hit_the_cache() {
        let synth = synthesizer();
        let hits = vec![sample_hit("doc1", 0, "some content")];
        let first = synth.synthesize("u1", "s1", "question?", &hits).await.unwrap();
        let second = synth.synthesize("u1", "s1", "question?", &hits).await.unwrap();
        assert_eq!(first.answer, second.answer);
    }
}
