//! Core data model and error kinds shared across the crate.
//!
//! Entities here mirror the relational schema owned by [`crate::db::metastore`]: `User`,
//! `Space`, `Document`, `Chunk`, `ImageAsset`, `ResearchSession`, `Activity`. Every read and
//! write in the system is scoped by the `(user_id, space_id)` pair carried on these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================================================
// Error kinds
// ============================================================================

/// The eight error kinds of the core (see SPEC_FULL.md §7).
///
/// Subsystem errors (MetaStore, SearchIndex, Cache, HTTP clients) use their own narrow error
/// types and are bridged into `CoreError` via `From` impls at the module boundary, rather than
/// passing stringly-typed errors across layers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed request: unknown mode, dimension mismatch, missing required field.
    #[error("validation error: {0}")]
    Validation(String),

    /// Entity does not exist, or does not belong to the caller's tenant.
    #[error("not found: {0}")]
    NotFound(String),

    /// Constraint violation (duplicate email, duplicate default space, etc).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller is authenticated but not entitled to the requested resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Rejected file type or unsupported operation.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Upstream (DB, search index, cache, web, LLM) failed transiently; retried and exhausted.
    #[error("transient upstream failure: {0}")]
    TransientUpstream(String),

    /// A request or sub-call deadline was exceeded.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Invariant violation or unexpected internal state. Never leaks internals to callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The protocol-agnostic exit code for this error kind (SPEC_FULL.md §6).
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "bad_request",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::Unsupported(_) => "unsupported",
            CoreError::TransientUpstream(_) => "transient_upstream",
            CoreError::DeadlineExceeded(_) => "deadline_exceeded",
            CoreError::Internal(_) => "internal",
        }
    }

    fn http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::Unsupported(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::TransientUpstream(_) => StatusCode::BAD_GATEWAY,
            CoreError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl axum::response::IntoResponse for CoreError {
    fn into_response(self) -> axum::response::Response {
        let status = self.http_status();
        if matches!(self, CoreError::Internal(_)) {
            tracing::error!(error = %self, "internal error");
        } else {
            tracing::warn!(error = %self, code = self.code(), "request error");
        }
        let body = axum::Json(serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A registered account. Created by the host application's auth gateway; the core only ever
/// reads `id`/`email` off of it (see SPEC_FULL.md §1 Out of scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// A private collection of documents owned by one user. Every user has at least one space,
/// enforced at `create_user` time by [`crate::db::metastore::MetaStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Declared or sniffed type of an uploaded file, driving [`crate::ingest::extract`] dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Pdf,
    Html,
    Docx,
    Pptx,
    Xlsx,
    Csv,
    Json,
    Markdown,
    Text,
    Image,
}

impl SourceType {
    /// Best-effort sniff from a file name's extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit('.').next()?.to_lowercase();
        Some(match ext.as_str() {
            "pdf" => Self::Pdf,
            "html" | "htm" => Self::Html,
            "docx" => Self::Docx,
            "pptx" => Self::Pptx,
            "xlsx" | "xls" => Self::Xlsx,
            "csv" => Self::Csv,
            "json" => Self::Json,
            "md" | "markdown" => Self::Markdown,
            "txt" => Self::Text,
            "png" | "jpg" | "jpeg" | "webp" | "gif" | "bmp" => Self::Image,
            _ => return None,
        })
    }
}

/// An uploaded file's metadata and provenance, owned by one `(user_id, space_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub space_id: String,
    pub source_type: SourceType,
    pub file_name: String,
    pub blob_url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A contiguous slice of a document's normalized text, produced by [`crate::rag::chunker`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    /// 0-based index, contiguous within a document (invariant: `0..n-1`, no gaps).
    pub chunk_index: u32,
    pub content: String,
    /// Unit-normalized embedding of dimension `D`, if persisted in MetaStore.
    pub embedding: Option<Vec<f32>>,
    pub char_count: u32,
    pub created_at: DateTime<Utc>,
}

/// An extracted or uploaded image, with optional caption/OCR/embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAsset {
    pub id: String,
    pub document_id: String,
    pub user_id: String,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub caption: Option<String>,
    /// `primary` (full captioning model) or `fallback` (smaller model after timeout).
    pub caption_source: Option<String>,
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Unit-normalized embedding of dimension `D_img`, if persisted in MetaStore.
    pub embedding: Option<Vec<f32>>,
    pub native_width: Option<u32>,
    pub native_height: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Role of a single turn in a [`ResearchSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A reference attached to a Deep Research or single-shot RAG answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub source: ReferenceSource,
    pub document_id: Option<String>,
    pub chunk_index: Option<u32>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub snippet: Option<String>,
}

/// Which evidence group a [`Reference`] was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSource {
    Local,
    Url,
    Web,
    Missing,
}

/// One turn of a research conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchMessage {
    pub role: MessageRole,
    pub text: String,
    #[serde(default)]
    pub references: Vec<Reference>,
    pub confidence: Option<f32>,
    pub elapsed_seconds: Option<f64>,
    pub web_attempted: bool,
    #[serde(default)]
    pub followup_questions: Vec<String>,
}

/// A stateful Deep Research conversation, persisted to MetaStore and mirrored to Cache.
///
/// `messages` is bounded: only the last ~40 are retained on load (see SPEC_FULL.md §4.K).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSession {
    pub id: String,
    pub user_id: String,
    pub space_id: String,
    pub title: Option<String>,
    pub messages: Vec<ResearchMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResearchSession {
    /// Maximum number of messages retained per session (SPEC_FULL.md §4.K).
    pub const MAX_RETAINED_MESSAGES: usize = 40;

    pub fn truncate_history(&mut self) {
        if self.messages.len() > Self::MAX_RETAINED_MESSAGES {
            let drop = self.messages.len() - Self::MAX_RETAINED_MESSAGES;
            self.messages.drain(0..drop);
        }
    }
}

/// Kind of user-initiated action recorded for auditing (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Upload,
    Search,
    DeepResearch,
    DeleteDoc,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub user_id: String,
    pub kind: ActivityKind,
    pub details: serde_json::Value,
    pub ts: DateTime<Utc>,
}

// ============================================================================
// Retrieval-facing types
// ============================================================================

/// A single retrieval hit, as returned by [`crate::rag::retriever::Retriever`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub document_id: String,
    pub chunk_index: u32,
    pub content: String,
    pub file_name: String,
    pub user_id: String,
    pub space_id: String,
    /// Normalized score in `[0, 1]` after RRF fusion and/or recency decay.
    pub score: f32,
    pub created_at: DateTime<Utc>,
}

/// Query mode accepted by `/search`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Semantic,
    Fulltext,
    Hybrid,
    Rag,
}

// ============================================================================
// Auth (thin JWT-bearer layer, SPEC_FULL.md §6/§10 — out of scope: registration,
// password policy, session storage; the core only mints and verifies claims)
// ============================================================================

/// Claims carried on both the access and refresh tokens minted by
/// [`crate::auth::jwt::AuthService`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

/// Response body for the token-issuing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}
