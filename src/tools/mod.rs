//! External capabilities consumed by [`crate::research::deep_research`] (SPEC_FULL.md §4.L).
//!
//! - [`websearch`](crate::tools::websearch) — the `WebSearch` trait and its
//!   `{serpapi, bing, ddg, none}` provider implementations.

pub mod websearch;
