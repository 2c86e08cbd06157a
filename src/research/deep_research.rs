//! Stateful agentic question answering over local retrieval plus optional web search
//! (SPEC_FULL.md §4.K).
//!
//! The control loop (decompose → dispatch → synthesize) follows the shape of the teacher's
//! `OrchestratorAgent` (`agents/orchestrator.rs`): a Generator call produces a small set of
//! sub-tasks as JSON, each is dispatched independently, and a final Generator call synthesizes
//! the collected evidence into one answer. The teacher's own `research::coordinator` module is
//! not usable as a base — it does not compile — so it is replaced outright by the explicit
//! PLAN/LOCAL_RETRIEVE/COVERAGE_EVAL/.../SYNTHESIS state machine below rather than adapted.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::db::metastore::MetaStore;
use crate::llm::LLMClient;
use crate::rag::cache::{Cache, CacheKind};
use crate::rag::retriever::{RetrieveFilters, Retriever};
use crate::tools::websearch::WebSearch;
use crate::types::{
    CoreError, Hit, MessageRole, Reference, ReferenceSource, Result, ResearchMessage, ResearchSession,
};
use crate::utils::toml_config::DeepResearchConfig;

const PLAN_SYSTEM_PROMPT: &str = "You are a research planning assistant. Break the user's question down \
into 2 to 4 focused sub-questions that together cover what's needed to answer it well. \
Respond ONLY with a JSON array of strings, e.g. [\"sub-question one\", \"sub-question two\"].";

const REWRITE_SYSTEM_PROMPT: &str = "Condense the following question into a short, keyword-rich web \
search phrase. Respond with only the phrase, no quotes, no explanation.";

const MISSING_CONCEPTS_SYSTEM_PROMPT: &str = "Given the question and the context already gathered, list \
up to 3 concepts or facts that are NOT covered by the context but would be needed to answer fully. \
Respond ONLY with a JSON array of short strings. If nothing is missing, respond with [].";

const SYNTHESIS_SYSTEM_PROMPT: &str = "Answer the user's question using only the evidence in the \
provided context, grouped by source below. If the context is insufficient, say so plainly. Do not \
invent facts not present in the context.";

/// A group of evidence contributing to the final synthesis, in presentation order
/// `{local, url, web, missing}` (SPEC_FULL.md §4.K SYNTHESIS).
#[derive(Debug, Clone)]
struct ContextGroup {
    label: &'static str,
    source: ReferenceSource,
    entries: Vec<(Option<Hit>, Option<String>, String)>,
}

impl ContextGroup {
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn render(&self) -> String {
        let body = self
            .entries
            .iter()
            .map(|(_, url, text)| match url {
                Some(u) => format!("[{u}]\n{text}"),
                None => text.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("--- {} ---\n{}", self.label, body)
    }

    fn references(&self) -> Vec<Reference> {
        self.entries
            .iter()
            .map(|(hit, url, text)| match hit {
                Some(h) => Reference {
                    source: self.source,
                    document_id: Some(h.document_id.clone()),
                    chunk_index: Some(h.chunk_index),
                    title: Some(h.file_name.clone()),
                    url: None,
                    snippet: Some(truncate(&h.content, 240)),
                },
                None => Reference {
                    source: self.source,
                    document_id: None,
                    chunk_index: None,
                    title: None,
                    url: url.clone(),
                    snippet: Some(truncate(text, 240)),
                },
            })
            .collect()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect::<String>() + "..."
    }
}

struct Coverage {
    total_hits: usize,
    unique_docs: usize,
    best_distance: f32,
}

impl Coverage {
    fn evaluate(hits: &[Hit]) -> Self {
        let unique_docs: HashSet<&str> = hits.iter().map(|h| h.document_id.as_str()).collect();
        let best_distance = hits.iter().map(|h| 1.0 - h.score).fold(f32::INFINITY, f32::min);
        Self {
            total_hits: hits.len(),
            unique_docs: unique_docs.len(),
            best_distance: if best_distance.is_finite() { best_distance } else { 1.0 },
        }
    }

    fn is_strong(&self, config: &DeepResearchConfig) -> bool {
        self.total_hits >= config.h_min && self.unique_docs >= config.d_min && self.best_distance <= config.delta_max
    }
}

/// Outcome of a single `ask` call (SPEC_FULL.md §4.K RETURN).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResearchAnswer {
    pub conversation_id: String,
    pub answer: String,
    pub confidence: f32,
    pub web_attempted: bool,
    pub elapsed_seconds: f64,
    pub references: Vec<Reference>,
    pub followup_questions: Vec<String>,
}

pub struct DeepResearchAgent {
    generator: Arc<dyn LLMClient>,
    retriever: Arc<Retriever>,
    web_search: Arc<dyn WebSearch>,
    metastore: Arc<MetaStore>,
    cache: Arc<Cache>,
    config: DeepResearchConfig,
}

impl DeepResearchAgent {
    pub fn new(
        generator: Arc<dyn LLMClient>,
        retriever: Arc<Retriever>,
        web_search: Arc<dyn WebSearch>,
        metastore: Arc<MetaStore>,
        cache: Arc<Cache>,
        config: DeepResearchConfig,
    ) -> Self {
        Self {
            generator,
            retriever,
            web_search,
            metastore,
            cache,
            config,
        }
    }

    /// `/deep-research/start`: allocates a fresh, empty session.
    pub async fn start(&self, user_id: &str, space_id: &str) -> Result<String> {
        let now = chrono::Utc::now();
        let session = ResearchSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            space_id: space_id.to_string(),
            title: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.metastore.save_research_session(&session).await?;
        self.mirror_to_cache(&session);
        Ok(session.id)
    }

    fn session_cache_key(&self, user_id: &str, conversation_id: &str) -> String {
        self.cache
            .make_key(user_id, conversation_id, CacheKind::Llm, 0, "research_session")
    }

    fn mirror_to_cache(&self, session: &ResearchSession) {
        if let Ok(value) = serde_json::to_value(session) {
            self.cache.set(
                &self.session_cache_key(&session.user_id, &session.id),
                value,
                Some(Duration::from_secs(self.config.t_total_seconds.max(3600))),
            );
        }
    }

    async fn load_session(&self, user_id: &str, conversation_id: &str) -> Result<ResearchSession> {
        let key = self.session_cache_key(user_id, conversation_id);
        if let Some(cached) = self.cache.get(&key) {
            if let Ok(mut session) = serde_json::from_value::<ResearchSession>(cached) {
                session.truncate_history();
                return Ok(session);
            }
        }
        self.metastore.load_research_session(user_id, conversation_id).await
    }

    /// `/deep-research/ask`: runs one agentic loop under the wall-clock budget `T_total`.
    pub async fn ask(
        &self,
        user_id: &str,
        space_id: &str,
        conversation_id: &str,
        message: &str,
        force_web: bool,
        urls: &[String],
    ) -> Result<ResearchAnswer> {
        let start = Instant::now();
        let budget = self.config.t_total();
        let mut session = self.load_session(user_id, conversation_id).await?;

        let tail: Vec<String> = session.messages.iter().rev().take(4).map(|m| m.text.clone()).collect();

        let plan = self.plan(message, &tail, start, budget).await;
        let sub_questions = plan.unwrap_or_else(|| vec![message.to_string()]);

        let filters = RetrieveFilters::default();
        let mut local_hits = self.local_retrieve(user_id, space_id, &sub_questions, &filters).await?;
        let mut coverage = Coverage::evaluate(&local_hits);

        let mut web_attempted = false;
        let mut web_group = ContextGroup {
            label: "web",
            source: ReferenceSource::Web,
            entries: Vec::new(),
        };
        let mut url_group = ContextGroup {
            label: "url",
            source: ReferenceSource::Url,
            entries: Vec::new(),
        };
        let mut missing_group = ContextGroup {
            label: "missing",
            source: ReferenceSource::Missing,
            entries: Vec::new(),
        };

        if self.remaining(start, budget) > self.phase_floor() {
            self.fetch_urls(urls, &mut url_group).await;
        }

        let mut rewritten_query = None;
        if !coverage.is_strong(&self.config) {
            for _ in 0..self.config.retry_loops.max(1) {
                if coverage.is_strong(&self.config) || self.remaining(start, budget) <= self.phase_floor() {
                    break;
                }
                let Some(rewritten) = self.rewrite(message, start, budget).await else {
                    break;
                };
                let rewritten_hits = self
                    .retriever
                    .hybrid(user_id, space_id, &rewritten, Some(self.config.top_k_local), &filters)
                    .await
                    .unwrap_or_default();
                local_hits = merge_unique(local_hits, rewritten_hits);
                coverage = Coverage::evaluate(&local_hits);
                rewritten_query = Some(rewritten);
            }

            let should_web = (force_web || !coverage.is_strong(&self.config))
                && self.web_search.provider_name() != "none"
                && self.remaining(start, budget) > self.phase_floor();
            if should_web {
                web_attempted = true;
                let query = rewritten_query.as_deref().unwrap_or(message);
                self.web_search(query, &mut web_group).await;
            }
        } else if force_web && self.web_search.provider_name() != "none" && self.remaining(start, budget) > self.phase_floor() {
            web_attempted = true;
            self.web_search(message, &mut web_group).await;
        }

        if self.remaining(start, budget) > self.phase_floor() {
            self.missing_concepts(user_id, space_id, message, &local_hits, &filters, &mut missing_group)
                .await;
        }

        let local_group = ContextGroup {
            label: "local",
            source: ReferenceSource::Local,
            entries: local_hits
                .iter()
                .map(|h| (Some(h.clone()), None, h.content.clone()))
                .collect(),
        };

        let groups: Vec<&ContextGroup> = [&local_group, &url_group, &web_group, &missing_group]
            .into_iter()
            .filter(|g| !g.is_empty())
            .collect();

        let (answer, llm_succeeded) = self.synthesize(message, &tail, &groups, start, budget).await;

        let web_only = !web_group.is_empty() && local_group.is_empty() && url_group.is_empty() && missing_group.is_empty();
        let confidence = self.confidence(&coverage, llm_succeeded, web_only);
        let followup_questions = if confidence < self.config.confidence_threshold {
            self.followup_questions(message, &tail, start, budget).await
        } else {
            Vec::new()
        };

        let elapsed_seconds = start.elapsed().as_secs_f64();
        let references: Vec<Reference> = groups.iter().flat_map(|g| g.references()).collect();

        let now = chrono::Utc::now();
        session.messages.push(ResearchMessage {
            role: MessageRole::User,
            text: message.to_string(),
            references: Vec::new(),
            confidence: None,
            elapsed_seconds: None,
            web_attempted: false,
            followup_questions: Vec::new(),
        });
        session.messages.push(ResearchMessage {
            role: MessageRole::Assistant,
            text: answer.clone(),
            references: references.clone(),
            confidence: Some(confidence),
            elapsed_seconds: Some(elapsed_seconds),
            web_attempted,
            followup_questions: followup_questions.clone(),
        });
        session.truncate_history();
        session.updated_at = now;
        self.metastore.save_research_session(&session).await?;
        self.mirror_to_cache(&session);

        Ok(ResearchAnswer {
            conversation_id: conversation_id.to_string(),
            answer,
            confidence,
            web_attempted,
            elapsed_seconds,
            references,
            followup_questions,
        })
    }

    fn remaining(&self, start: Instant, budget: Duration) -> Duration {
        budget.saturating_sub(start.elapsed())
    }

    /// Below this remaining budget, every subsequent phase is skipped in favor of an immediate
    /// SYNTHESIS with whatever evidence already exists.
    fn phase_floor(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn plan(&self, message: &str, tail: &[String], start: Instant, budget: Duration) -> Option<Vec<String>> {
        if self.remaining(start, budget) <= self.phase_floor() {
            return None;
        }
        let context = if tail.is_empty() {
            message.to_string()
        } else {
            format!("Recent conversation:\n{}\n\nCurrent question: {message}", tail.join("\n"))
        };
        let response = self.generator.generate_with_system(PLAN_SYSTEM_PROMPT, &context).await.ok()?;
        let questions: Vec<String> = serde_json::from_str(response.trim()).ok()?;
        if questions.is_empty() {
            None
        } else {
            Some(questions.into_iter().take(4).collect())
        }
    }

    async fn local_retrieve(
        &self,
        user_id: &str,
        space_id: &str,
        sub_questions: &[String],
        filters: &RetrieveFilters,
    ) -> Result<Vec<Hit>> {
        let mut all = Vec::new();
        for question in sub_questions {
            let hits = self
                .retriever
                .hybrid(user_id, space_id, question, Some(self.config.top_k_local), filters)
                .await?;
            all = merge_unique(all, hits);
        }
        Ok(all)
    }

    async fn rewrite(&self, message: &str, start: Instant, budget: Duration) -> Option<String> {
        if self.remaining(start, budget) <= self.phase_floor() {
            return None;
        }
        self.generator
            .generate_with_system(REWRITE_SYSTEM_PROMPT, message)
            .await
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    async fn web_search(&self, query: &str, group: &mut ContextGroup) {
        let Ok(results) = self.web_search.search(query, self.config.top_k_web).await else {
            return;
        };
        for result in results.into_iter().take(self.config.top_k_web) {
            let text = match self.web_search.fetch(&result.url).await {
                Ok(page) => truncate(&page, 4000),
                Err(_) => result.snippet.clone(),
            };
            group.entries.push((None, Some(result.url), text));
        }
    }

    async fn fetch_urls(&self, urls: &[String], group: &mut ContextGroup) {
        for url in urls {
            if let Ok(text) = self.web_search.fetch(url).await {
                group.entries.push((None, Some(url.clone()), truncate(&text, 4000)));
            }
        }
    }

    async fn missing_concepts(
        &self,
        user_id: &str,
        space_id: &str,
        message: &str,
        local_hits: &[Hit],
        filters: &RetrieveFilters,
        group: &mut ContextGroup,
    ) {
        let context_preview = local_hits.iter().map(|h| h.content.as_str()).collect::<Vec<_>>().join("\n");
        for _ in 0..self.config.missing_concept_loops {
            let prompt = format!("Question: {message}\n\nContext so far:\n{}", truncate(&context_preview, 3000));
            let Ok(response) = self.generator.generate_with_system(MISSING_CONCEPTS_SYSTEM_PROMPT, &prompt).await else {
                break;
            };
            let Ok(concepts) = serde_json::from_str::<Vec<String>>(response.trim()) else {
                break;
            };
            if concepts.is_empty() {
                break;
            }
            for concept in concepts.iter().take(self.config.top_k_local) {
                if let Ok(hits) = self.retriever.hybrid(user_id, space_id, concept, Some(2), filters).await {
                    for hit in hits {
                        group.entries.push((Some(hit.clone()), None, hit.content.clone()));
                    }
                }
            }
        }
    }

    async fn synthesize(
        &self,
        message: &str,
        tail: &[String],
        groups: &[&ContextGroup],
        start: Instant,
        budget: Duration,
    ) -> (String, bool) {
        if groups.is_empty() {
            return ("No answer found in the provided context.".to_string(), true);
        }
        if self.remaining(start, budget).is_zero() {
            return ("Research timed out before an answer could be synthesized.".to_string(), false);
        }

        let context = groups.iter().map(|g| g.render()).collect::<Vec<_>>().join("\n\n");
        let history = if tail.is_empty() {
            String::new()
        } else {
            format!("Recent conversation:\n{}\n\n", tail.join("\n"))
        };
        let prompt = format!("{history}Context:\n{context}\n\nQuestion: {message}");

        match self.generator.generate_with_system(SYNTHESIS_SYSTEM_PROMPT, &prompt).await {
            Ok(answer) => (answer, true),
            Err(_) => ("No answer found in the provided context.".to_string(), false),
        }
    }

    async fn followup_questions(&self, message: &str, tail: &[String], start: Instant, budget: Duration) -> Vec<String> {
        if self.remaining(start, budget) <= self.phase_floor() {
            return Vec::new();
        }
        let prompt = format!(
            "Question: {message}\nRecent conversation: {}\n\nSuggest up to 3 natural follow-up questions. \
             Respond ONLY with a JSON array of strings.",
            tail.join(" / ")
        );
        let Ok(response) = self.generator.generate_with_system(PLAN_SYSTEM_PROMPT, &prompt).await else {
            return Vec::new();
        };
        let Ok(candidates) = serde_json::from_str::<Vec<String>>(response.trim()) else {
            return Vec::new();
        };
        candidates
            .into_iter()
            .filter(|q| relevance(q, message, tail) >= self.config.followup_relevance_min)
            .take(3)
            .collect()
    }

    /// Pinned down exactly as SPEC_FULL.md §9 resolves it:
    /// `base = clamp(confidence_baseline + (1 - confidence_baseline) * (0.6 * min(unique_docs,
    /// d_min*2) / (d_min*2) + 0.4 * (1 - min(best_distance / delta_max, 1.0))),
    /// confidence_baseline, 1.0)`, then `* 0.6` if synthesis produced no usable text, then
    /// capped at `0.6` if every reference came from the web (no local evidence at all).
    fn confidence(&self, coverage: &Coverage, llm_succeeded: bool, web_only: bool) -> f32 {
        let d_min = self.config.d_min.max(1);
        let cap = (d_min * 2) as f32;
        let doc_term = (coverage.unique_docs.min(d_min * 2) as f32 / cap).clamp(0.0, 1.0);
        let distance_term = 1.0 - (coverage.best_distance / self.config.delta_max.max(f32::EPSILON)).min(1.0);
        let base = (self.config.confidence_baseline
            + (1.0 - self.config.confidence_baseline) * (0.6 * doc_term + 0.4 * distance_term))
            .clamp(self.config.confidence_baseline, 1.0);

        let mut confidence = base;
        if !llm_succeeded {
            confidence = base * 0.6;
        }
        if web_only {
            confidence = confidence.min(0.6);
        }
        confidence
    }
}

fn merge_unique(mut base: Vec<Hit>, extra: Vec<Hit>) -> Vec<Hit> {
    let mut seen: HashSet<(String, u32)> = base.iter().map(|h| (h.document_id.clone(), h.chunk_index)).collect();
    for hit in extra {
        let key = (hit.document_id.clone(), hit.chunk_index);
        if seen.insert(key) {
            base.push(hit);
        }
    }
    base
}

/// Token-Jaccard relevance between a candidate follow-up and the current exchange, used to
/// filter out follow-ups that have drifted off-topic (SPEC_FULL.md §4.K RETURN,
/// `followup_relevance_min`).
fn relevance(candidate: &str, message: &str, tail: &[String]) -> f32 {
    let candidate_tokens: HashSet<String> = candidate.to_lowercase().split_whitespace().map(String::from).collect();
    let mut reference = message.to_lowercase();
    reference.push(' ');
    reference.push_str(&tail.join(" ").to_lowercase());
    let reference_tokens: HashSet<String> = reference.split_whitespace().map(String::from).collect();

    if candidate_tokens.is_empty() || reference_tokens.is_empty() {
        return 0.0;
    }
    let intersection = candidate_tokens.intersection(&reference_tokens).count() as f32;
    let union = candidate_tokens.union(&reference_tokens).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}
