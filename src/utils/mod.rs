//! Configuration loading and hot-reload (SPEC_FULL.md §6's ambient paragraph).

/// TOML-based configuration (`ares.toml`) with file-watch hot reload.
pub mod toml_config;
