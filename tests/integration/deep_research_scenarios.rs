//! Deep Research seed scenarios 5 (strong local coverage, no web), 6 (forced web), and 7
//! (budget-bounded response under a stalled retrieval leg) from SPEC_FULL.md §8.

use std::sync::Arc;
use std::time::Duration;

use retrieva::db::vectorstore::InMemoryVectorStore;
use retrieva::db::VectorStore;
use retrieva::tools::websearch::{NoneWebSearch, SearchResult, WebSearch};
use retrieva::utils::toml_config::DeepResearchConfig;

use crate::common::fixtures::{seed_chunk, seed_document, seed_user_and_space, test_state_with_deep_research_config};
use crate::common::mocks::{MockWebSearch, ScriptedLLMClient, SlowVectorStore};

/// Scenario 5: enough local coverage (≥ h_min hits across ≥ d_min documents, within
/// delta_max) means Deep Research answers from local evidence alone and never calls web search.
#[tokio::test]
async fn strong_local_coverage_skips_web_search() {
    let generator: Arc<dyn retrieva::LLMClient> =
        Arc::new(ScriptedLLMClient::new("Data retention is governed by the attached policies."));
    let vector_store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let state = test_state_with_deep_research_config(
        generator,
        Arc::new(NoneWebSearch),
        vector_store,
        DeepResearchConfig::default(),
    )
    .await;
    let (claims, space_id) = seed_user_and_space(&state, "strong-coverage@example.com").await;

    seed_document(
        &state,
        &claims.sub,
        &space_id,
        "retention.txt",
        None,
        vec![seed_chunk("data retention schedule for all record types", [1.0, 0.0, 0.0])],
    )
    .await;
    seed_document(
        &state,
        &claims.sub,
        &space_id,
        "deletion.txt",
        None,
        vec![seed_chunk("data retention and deletion obligations under policy", [0.0, 1.0, 0.0])],
    )
    .await;
    seed_document(
        &state,
        &claims.sub,
        &space_id,
        "audit.txt",
        None,
        vec![seed_chunk("audit trail for data retention compliance", [0.0, 0.0, 1.0])],
    )
    .await;

    let conversation_id = state.deep_research.start(&claims.sub, &space_id).await.unwrap();
    let answer = state
        .deep_research
        .ask(&claims.sub, &space_id, &conversation_id, "What is our data retention policy?", false, &[])
        .await
        .unwrap();

    assert!(!answer.web_attempted);
    assert!(!answer.answer.is_empty());
    assert!(answer.references.iter().all(|r| r.source == retrieva::types::ReferenceSource::Local));
}

/// Scenario 6: `force_web=true` triggers a web search even when local coverage would otherwise
/// be considered strong, as long as the configured provider isn't `none`.
#[tokio::test]
async fn forced_web_always_dispatches_a_web_search() {
    let generator: Arc<dyn retrieva::LLMClient> = Arc::new(ScriptedLLMClient::new("Synthesized answer."));
    let mut web_search = MockWebSearch::new();
    web_search.expect_provider_name().returning(|| "mock");
    web_search.expect_search().returning(|_, _| {
        Ok(vec![SearchResult {
            title: "External reference".to_string(),
            url: "https://example.com/article".to_string(),
            snippet: "a relevant snippet".to_string(),
        }])
    });
    web_search.expect_fetch().returning(|_| Ok("the fetched page body".to_string()));

    let vector_store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let state = test_state_with_deep_research_config(
        generator,
        Arc::new(web_search) as Arc<dyn WebSearch>,
        vector_store,
        DeepResearchConfig::default(),
    )
    .await;
    let (claims, space_id) = seed_user_and_space(&state, "forced-web@example.com").await;

    let conversation_id = state.deep_research.start(&claims.sub, &space_id).await.unwrap();
    let answer = state
        .deep_research
        .ask(&claims.sub, &space_id, &conversation_id, "What happened in the news today?", true, &[])
        .await
        .unwrap();

    assert!(answer.web_attempted);
    assert!(answer.references.iter().any(|r| r.source == retrieva::types::ReferenceSource::Web));
}

/// Scenario 7: a stalled local-retrieval leg still returns within a bounded time close to the
/// configured `T_total`, rather than hanging. `phase_floor()` (hard-coded to 5s) gates every
/// later phase once the budget is this tight, so the only phase that runs besides `local_retrieve`
/// and `synthesize` is the unconditional ones — exactly what's exercised here.
#[tokio::test]
async fn tight_budget_with_a_slow_retrieval_leg_still_completes_promptly() {
    let generator: Arc<dyn retrieva::LLMClient> = Arc::new(ScriptedLLMClient::new("No strong local answer found."));
    let vector_store: Arc<dyn VectorStore> = Arc::new(SlowVectorStore::new(Duration::from_millis(200)));
    let config = DeepResearchConfig { t_total_seconds: 2, ..DeepResearchConfig::default() };
    let state =
        test_state_with_deep_research_config(generator, Arc::new(NoneWebSearch), vector_store, config).await;
    let (claims, space_id) = seed_user_and_space(&state, "tight-budget@example.com").await;

    let conversation_id = state.deep_research.start(&claims.sub, &space_id).await.unwrap();
    let started = std::time::Instant::now();
    let answer = state
        .deep_research
        .ask(&claims.sub, &space_id, &conversation_id, "anything", false, &[])
        .await
        .unwrap();
    let wall_clock = started.elapsed().as_secs_f64();

    assert!(
        answer.elapsed_seconds <= 2.0 * 1.05,
        "elapsed_seconds {} exceeded T_total * 1.05",
        answer.elapsed_seconds
    );
    assert!(wall_clock < 2.0 * 1.05 + 1.0, "wall clock {wall_clock} took far longer than the reported budget");
    assert!(!answer.web_attempted);
    // No matching local evidence: confidence floors at the configured baseline.
    assert!((answer.confidence - config_baseline()).abs() < 1e-4);
}

fn config_baseline() -> f32 {
    DeepResearchConfig::default().confidence_baseline
}
