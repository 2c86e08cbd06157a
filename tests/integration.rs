//! Entry point for the cross-module integration suite.
//!
//! Cargo only auto-discovers top-level `tests/*.rs` files as test binaries; `tests/common/` and
//! `tests/integration/` are otherwise invisible to it. Pulling both in here via `#[path]` keeps
//! every scenario module compiled into one `integration` test binary.

#[path = "common/mod.rs"]
mod common;

#[path = "integration/tenancy_and_ordering.rs"]
mod tenancy_and_ordering;

#[path = "integration/search_properties.rs"]
mod search_properties;

#[path = "integration/hybrid_and_cache.rs"]
mod hybrid_and_cache;

#[path = "integration/deep_research_scenarios.rs"]
mod deep_research_scenarios;

#[path = "integration/http_api.rs"]
mod http_api;

#[path = "integration/llm_provider.rs"]
mod llm_provider;

#[path = "integration/idempotent_init.rs"]
mod idempotent_init;
