//! HTTP API Handlers and Routes
//!
//! REST layer built on Axum (SPEC_FULL.md §6). Routes live at root level, not under `/api`.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Auth
//! - `POST /auth/token` - Mint a token pair for an email, creating the user on first use
//! - `POST /auth/refresh` - Mint a fresh pair from a still-valid refresh token
//!
//! ## Ingestion and retrieval
//! - `POST /upload` - Multipart document upload into a space
//! - `POST /search` - Semantic / fulltext / hybrid retrieval, or full RAG synthesis
//! - `POST /image-search` - Vector, lexical, or tag-only image search
//!
//! ## Deep Research
//! - `POST /deep-research/start` - Allocate a fresh conversation
//! - `POST /deep-research/ask` - Run one agentic research loop
//!
//! ## Admin
//! - `GET /admin/documents` - List documents, optionally scoped to one space
//! - `DELETE /admin/documents/{id}` - Delete a document
//! - `POST /admin/reindex` - Rebuild SearchIndex entries from MetaStore
//!
//! ## Unauthenticated
//! - `GET /health` - Liveness probe
//! - `GET /config/info` - Non-sensitive configuration summary
//!
//! # Authentication
//!
//! Protected routes require a valid JWT token in the `Authorization` header:
//! ```text
//! Authorization: Bearer <token>
//! ```

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
