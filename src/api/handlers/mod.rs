//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Authentication handlers (token issuance, refresh).
pub mod auth;
/// RAG handlers: upload, search, image-search, admin.
pub mod rag;
/// Deep Research handlers: start/ask.
pub mod research;
