//! Deep Research: an agentic question-answering loop over local retrieval and optional web
//! search, stateful per conversation (SPEC_FULL.md §4.K).
//!
//! [`deep_research::DeepResearchAgent`] is the sole entry point. It replaces the teacher's
//! `research::coordinator` module outright (that module does not compile as shipped) with an
//! explicit state machine grounded on the decompose/dispatch/synthesize shape of the teacher's
//! `agents::orchestrator::OrchestratorAgent`.

pub mod deep_research;

pub use deep_research::{DeepResearchAgent, ResearchAnswer};
