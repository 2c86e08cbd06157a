//! Authoritative relational store: users, spaces, documents, chunks, image assets, research
//! sessions, and the activity log (SPEC_FULL.md §4.A).
//!
//! Backed by `libsql`, mirroring the teacher's local-file/Turso-remote connection shape. Every
//! read accepts `(user_id[, space_id])`; every document-rooted write embeds both. Constraint
//! violations surface as [`CoreError::Conflict`], unknown ids as [`CoreError::NotFound`].

use chrono::Utc;
use libsql::{params, Builder, Connection};
use uuid::Uuid;

use crate::types::{
    Activity, ActivityKind, Chunk, Document, ImageAsset, ResearchMessage, ResearchSession, Space,
    SourceType, User,
};
use crate::types::{CoreError, Result};

/// Authoritative store for all entities in [`crate::types`].
///
/// Holds a single `libsql::Connection`; `libsql` connections are cheaply clonable and safe to
/// share across tasks, so no additional pooling layer is introduced (mirrors the teacher's
/// `TursoClient`, which does the same).
#[derive(Clone)]
pub struct MetaStore {
    conn: Connection,
}

fn internal(e: impl std::fmt::Display) -> CoreError {
    CoreError::Internal(e.to_string())
}

fn transient(e: impl std::fmt::Display) -> CoreError {
    CoreError::TransientUpstream(e.to_string())
}

impl MetaStore {
    /// Open a local on-disk database at `path` (e.g. `./data/metastore.db`).
    pub async fn open_local(path: &str) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(internal)?;
        let conn = db.connect().map_err(internal)?;
        Ok(Self { conn })
    }

    /// Open a remote Turso database, given a `libsql://` URL and auth token.
    pub async fn open_remote(url: &str, auth_token: &str) -> Result<Self> {
        let db = Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(internal)?;
        let conn = db.connect().map_err(internal)?;
        Ok(Self { conn })
    }

    /// Create all tables and indexes. Idempotent; safe to call on every startup.
    pub async fn init_schema(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                email_lower TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_login_at TEXT
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_lower ON users(email_lower)",
            "CREATE TABLE IF NOT EXISTS spaces (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                is_default INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_spaces_user ON spaces(user_id)",
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                space_id TEXT NOT NULL REFERENCES spaces(id),
                source_type TEXT NOT NULL,
                file_name TEXT NOT NULL,
                blob_url TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_documents_tenant ON documents(user_id, space_id)",
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id),
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding TEXT,
                char_count INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id, chunk_index)",
            "CREATE TABLE IF NOT EXISTS image_assets (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id),
                user_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                thumbnail_path TEXT,
                caption TEXT,
                caption_source TEXT,
                ocr_text TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                embedding TEXT,
                native_width INTEGER,
                native_height INTEGER,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_image_assets_document ON image_assets(document_id)",
            "CREATE TABLE IF NOT EXISTS research_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                space_id TEXT NOT NULL,
                title TEXT,
                messages TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_research_sessions_tenant
                ON research_sessions(user_id, space_id)",
            "CREATE TABLE IF NOT EXISTS activity (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                details TEXT NOT NULL,
                ts TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_activity_user ON activity(user_id, ts)",
        ];
        for stmt in statements {
            self.conn.execute(stmt, ()).await.map_err(internal)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Users & spaces
    // ------------------------------------------------------------------

    /// Create a user and its default space in one transaction. Every user owns at least one
    /// space from the moment it exists; this is never left to the caller.
    pub async fn create_user(&self, email: &str) -> Result<User> {
        let tx = self.conn.transaction().await.map_err(internal)?;
        let email_lower = email.to_lowercase();

        let mut existing = tx
            .query("SELECT id FROM users WHERE email_lower = ?1", params![email_lower.clone()])
            .await
            .map_err(internal)?;
        if existing.next().await.map_err(internal)?.is_some() {
            return Err(CoreError::Conflict(format!("email already registered: {email}")));
        }

        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        tx.execute(
            "INSERT INTO users (id, email, email_lower, created_at, last_login_at)
             VALUES (?1, ?2, ?3, ?4, NULL)",
            params![user_id.clone(), email.to_string(), email_lower, now.to_rfc3339()],
        )
        .await
        .map_err(internal)?;

        let space_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO spaces (id, user_id, name, is_default, created_at)
             VALUES (?1, ?2, 'default', 1, ?3)",
            params![space_id, user_id.clone(), now.to_rfc3339()],
        )
        .await
        .map_err(internal)?;

        tx.commit().await.map_err(transient)?;

        Ok(User {
            id: user_id,
            email: email.to_string(),
            created_at: now,
            last_login_at: None,
        })
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, email, created_at, last_login_at FROM users WHERE email_lower = ?1",
                params![email.to_lowercase()],
            )
            .await
            .map_err(internal)?;
        match rows.next().await.map_err(internal)? {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, email, created_at, last_login_at FROM users WHERE id = ?1",
                params![user_id.to_string()],
            )
            .await
            .map_err(internal)?;
        match rows.next().await.map_err(internal)? {
            Some(row) => row_to_user(&row),
            None => Err(CoreError::NotFound(format!("user {user_id}"))),
        }
    }

    pub async fn touch_last_login(&self, user_id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), user_id.to_string()],
            )
            .await
            .map_err(internal)?;
        Ok(())
    }

    pub async fn list_spaces(&self, user_id: &str) -> Result<Vec<Space>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, name, is_default, created_at FROM spaces
                 WHERE user_id = ?1 ORDER BY created_at ASC",
                params![user_id.to_string()],
            )
            .await
            .map_err(internal)?;
        let mut spaces = Vec::new();
        while let Some(row) = rows.next().await.map_err(internal)? {
            spaces.push(row_to_space(&row)?);
        }
        Ok(spaces)
    }

    pub async fn get_space(&self, user_id: &str, space_id: &str) -> Result<Space> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, name, is_default, created_at FROM spaces
                 WHERE id = ?1 AND user_id = ?2",
                params![space_id.to_string(), user_id.to_string()],
            )
            .await
            .map_err(internal)?;
        match rows.next().await.map_err(internal)? {
            Some(row) => row_to_space(&row),
            None => Err(CoreError::NotFound(format!("space {space_id}"))),
        }
    }

    pub async fn create_space(&self, user_id: &str, name: &str) -> Result<Space> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO spaces (id, user_id, name, is_default, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![id.clone(), user_id.to_string(), name.to_string(), now.to_rfc3339()],
            )
            .await
            .map_err(internal)?;
        Ok(Space {
            id,
            user_id: user_id.to_string(),
            name: name.to_string(),
            is_default: false,
            created_at: now,
        })
    }

    // ------------------------------------------------------------------
    // Documents, chunks, images
    // ------------------------------------------------------------------

    /// Insert a Document and its Chunks/ImageAssets in a single transaction. Ordering of
    /// `chunks` is preserved as `chunk_index`; callers must pass a contiguous `0..n` sequence.
    pub async fn ingest_document(
        &self,
        doc: &Document,
        chunks: &[Chunk],
        images: &[ImageAsset],
    ) -> Result<()> {
        self.get_space(&doc.user_id, &doc.space_id).await?;

        let tx = self.conn.transaction().await.map_err(internal)?;

        let metadata = serde_json::to_string(&doc.metadata).map_err(internal)?;
        tx.execute(
            "INSERT INTO documents (id, user_id, space_id, source_type, file_name, blob_url, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                doc.id.clone(),
                doc.user_id.clone(),
                doc.space_id.clone(),
                source_type_str(doc.source_type).to_string(),
                doc.file_name.clone(),
                doc.blob_url.clone(),
                metadata,
                doc.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(internal)?;

        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.chunk_index as usize != i {
                return Err(CoreError::Validation(format!(
                    "chunk_index {} is not contiguous at position {i}",
                    chunk.chunk_index
                )));
            }
            let embedding = chunk
                .embedding
                .as_ref()
                .map(|v| serde_json::to_string(v))
                .transpose()
                .map_err(internal)?;
            tx.execute(
                "INSERT INTO chunks (id, document_id, chunk_index, content, embedding, char_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    chunk.id.clone(),
                    chunk.document_id.clone(),
                    chunk.chunk_index as i64,
                    chunk.content.clone(),
                    embedding,
                    chunk.char_count as i64,
                    chunk.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(internal)?;
        }

        for image in images {
            let embedding = image
                .embedding
                .as_ref()
                .map(|v| serde_json::to_string(v))
                .transpose()
                .map_err(internal)?;
            let tags = serde_json::to_string(&image.tags).map_err(internal)?;
            tx.execute(
                "INSERT INTO image_assets (id, document_id, user_id, file_path, thumbnail_path,
                    caption, caption_source, ocr_text, tags, embedding, native_width, native_height, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    image.id.clone(),
                    image.document_id.clone(),
                    image.user_id.clone(),
                    image.file_path.clone(),
                    image.thumbnail_path.clone(),
                    image.caption.clone(),
                    image.caption_source.clone(),
                    image.ocr_text.clone(),
                    tags,
                    embedding,
                    image.native_width.map(|w| w as i64),
                    image.native_height.map(|h| h as i64),
                    image.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(internal)?;
        }

        tx.commit().await.map_err(transient)?;
        Ok(())
    }

    pub async fn get_document(&self, user_id: &str, space_id: &str, doc_id: &str) -> Result<Document> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, space_id, source_type, file_name, blob_url, metadata, created_at
                 FROM documents WHERE id = ?1 AND user_id = ?2 AND space_id = ?3",
                params![doc_id.to_string(), user_id.to_string(), space_id.to_string()],
            )
            .await
            .map_err(internal)?;
        match rows.next().await.map_err(internal)? {
            Some(row) => row_to_document(&row),
            None => Err(CoreError::NotFound(format!("document {doc_id}"))),
        }
    }

    pub async fn list_documents(&self, user_id: &str, space_id: &str) -> Result<Vec<Document>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, space_id, source_type, file_name, blob_url, metadata, created_at
                 FROM documents WHERE user_id = ?1 AND space_id = ?2 ORDER BY created_at DESC",
                params![user_id.to_string(), space_id.to_string()],
            )
            .await
            .map_err(internal)?;
        let mut docs = Vec::new();
        while let Some(row) = rows.next().await.map_err(internal)? {
            docs.push(row_to_document(&row)?);
        }
        Ok(docs)
    }

    pub async fn list_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, document_id, chunk_index, content, embedding, char_count, created_at
                 FROM chunks WHERE document_id = ?1 ORDER BY chunk_index ASC",
                params![document_id.to_string()],
            )
            .await
            .map_err(internal)?;
        let mut chunks = Vec::new();
        while let Some(row) = rows.next().await.map_err(internal)? {
            chunks.push(row_to_chunk(&row)?);
        }
        Ok(chunks)
    }

    /// Used by `reindex` to rebuild a document's SearchIndex entries from the authoritative store.
    pub async fn list_images(&self, document_id: &str) -> Result<Vec<ImageAsset>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, document_id, user_id, file_path, thumbnail_path, caption, caption_source,
                    ocr_text, tags, embedding, native_width, native_height, created_at
                 FROM image_assets WHERE document_id = ?1",
                params![document_id.to_string()],
            )
            .await
            .map_err(internal)?;
        let mut images = Vec::new();
        while let Some(row) = rows.next().await.map_err(internal)? {
            images.push(row_to_image_asset(&row)?);
        }
        Ok(images)
    }

    /// Delete a document and everything rooted under it. Cascades to chunks and image assets.
    pub async fn delete_document(&self, user_id: &str, space_id: &str, doc_id: &str) -> Result<()> {
        self.get_document(user_id, space_id, doc_id).await?;
        let tx = self.conn.transaction().await.map_err(internal)?;
        tx.execute(
            "DELETE FROM image_assets WHERE document_id = ?1",
            params![doc_id.to_string()],
        )
        .await
        .map_err(internal)?;
        tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![doc_id.to_string()])
            .await
            .map_err(internal)?;
        tx.execute(
            "DELETE FROM documents WHERE id = ?1 AND user_id = ?2 AND space_id = ?3",
            params![doc_id.to_string(), user_id.to_string(), space_id.to_string()],
        )
        .await
        .map_err(internal)?;
        tx.commit().await.map_err(transient)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Research sessions
    // ------------------------------------------------------------------

    pub async fn save_research_session(&self, session: &ResearchSession) -> Result<()> {
        let messages = serde_json::to_string(&session.messages).map_err(internal)?;
        self.conn
            .execute(
                "INSERT INTO research_sessions (id, user_id, space_id, title, messages, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    messages = excluded.messages,
                    updated_at = excluded.updated_at",
                params![
                    session.id.clone(),
                    session.user_id.clone(),
                    session.space_id.clone(),
                    session.title.clone(),
                    messages,
                    session.created_at.to_rfc3339(),
                    session.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(internal)?;
        Ok(())
    }

    /// Load a session, retaining only the last [`ResearchSession::MAX_RETAINED_MESSAGES`]
    /// messages.
    pub async fn load_research_session(&self, user_id: &str, session_id: &str) -> Result<ResearchSession> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, space_id, title, messages, created_at, updated_at
                 FROM research_sessions WHERE id = ?1 AND user_id = ?2",
                params![session_id.to_string(), user_id.to_string()],
            )
            .await
            .map_err(internal)?;
        let Some(row) = rows.next().await.map_err(internal)? else {
            return Err(CoreError::NotFound(format!("research session {session_id}")));
        };
        let mut session = row_to_research_session(&row)?;
        session.truncate_history();
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Activity log
    // ------------------------------------------------------------------

    pub async fn record_activity(&self, user_id: &str, kind: ActivityKind, details: serde_json::Value) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO activity (id, user_id, kind, details, ts) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    user_id.to_string(),
                    activity_kind_str(kind).to_string(),
                    details.to_string(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(internal)?;
        Ok(())
    }
}

fn source_type_str(t: SourceType) -> &'static str {
    match t {
        SourceType::Pdf => "pdf",
        SourceType::Html => "html",
        SourceType::Docx => "docx",
        SourceType::Pptx => "pptx",
        SourceType::Xlsx => "xlsx",
        SourceType::Csv => "csv",
        SourceType::Json => "json",
        SourceType::Markdown => "markdown",
        SourceType::Text => "text",
        SourceType::Image => "image",
    }
}

fn parse_source_type(s: &str) -> Result<SourceType> {
    Ok(match s {
        "pdf" => SourceType::Pdf,
        "html" => SourceType::Html,
        "docx" => SourceType::Docx,
        "pptx" => SourceType::Pptx,
        "xlsx" => SourceType::Xlsx,
        "csv" => SourceType::Csv,
        "json" => SourceType::Json,
        "markdown" => SourceType::Markdown,
        "text" => SourceType::Text,
        "image" => SourceType::Image,
        other => return Err(CoreError::Internal(format!("unknown source_type in storage: {other}"))),
    })
}

fn activity_kind_str(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::Upload => "upload",
        ActivityKind::Search => "search",
        ActivityKind::DeepResearch => "deep_research",
        ActivityKind::DeleteDoc => "delete_doc",
    }
}

fn parse_rfc3339(s: &str) -> Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(internal)
}

fn row_to_user(row: &libsql::Row) -> Result<User> {
    Ok(User {
        id: row.get::<String>(0).map_err(internal)?,
        email: row.get::<String>(1).map_err(internal)?,
        created_at: parse_rfc3339(&row.get::<String>(2).map_err(internal)?)?,
        last_login_at: row
            .get::<Option<String>>(3)
            .map_err(internal)?
            .map(|s| parse_rfc3339(&s))
            .transpose()?,
    })
}

fn row_to_space(row: &libsql::Row) -> Result<Space> {
    Ok(Space {
        id: row.get::<String>(0).map_err(internal)?,
        user_id: row.get::<String>(1).map_err(internal)?,
        name: row.get::<String>(2).map_err(internal)?,
        is_default: row.get::<i64>(3).map_err(internal)? != 0,
        created_at: parse_rfc3339(&row.get::<String>(4).map_err(internal)?)?,
    })
}

fn row_to_document(row: &libsql::Row) -> Result<Document> {
    let metadata_raw = row.get::<String>(6).map_err(internal)?;
    Ok(Document {
        id: row.get::<String>(0).map_err(internal)?,
        user_id: row.get::<String>(1).map_err(internal)?,
        space_id: row.get::<String>(2).map_err(internal)?,
        source_type: parse_source_type(&row.get::<String>(3).map_err(internal)?)?,
        file_name: row.get::<String>(4).map_err(internal)?,
        blob_url: row.get::<Option<String>>(5).map_err(internal)?,
        metadata: serde_json::from_str(&metadata_raw).map_err(internal)?,
        created_at: parse_rfc3339(&row.get::<String>(7).map_err(internal)?)?,
    })
}

fn row_to_chunk(row: &libsql::Row) -> Result<Chunk> {
    let embedding_raw = row.get::<Option<String>>(4).map_err(internal)?;
    Ok(Chunk {
        id: row.get::<String>(0).map_err(internal)?,
        document_id: row.get::<String>(1).map_err(internal)?,
        chunk_index: row.get::<i64>(2).map_err(internal)? as u32,
        content: row.get::<String>(3).map_err(internal)?,
        embedding: embedding_raw
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(internal)?,
        char_count: row.get::<i64>(5).map_err(internal)? as u32,
        created_at: parse_rfc3339(&row.get::<String>(6).map_err(internal)?)?,
    })
}

fn row_to_image_asset(row: &libsql::Row) -> Result<ImageAsset> {
    let tags_raw = row.get::<String>(8).map_err(internal)?;
    let embedding_raw = row.get::<Option<String>>(9).map_err(internal)?;
    Ok(ImageAsset {
        id: row.get::<String>(0).map_err(internal)?,
        document_id: row.get::<String>(1).map_err(internal)?,
        user_id: row.get::<String>(2).map_err(internal)?,
        file_path: row.get::<String>(3).map_err(internal)?,
        thumbnail_path: row.get::<Option<String>>(4).map_err(internal)?,
        caption: row.get::<Option<String>>(5).map_err(internal)?,
        caption_source: row.get::<Option<String>>(6).map_err(internal)?,
        ocr_text: row.get::<Option<String>>(7).map_err(internal)?,
        tags: serde_json::from_str(&tags_raw).map_err(internal)?,
        embedding: embedding_raw
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(internal)?,
        native_width: row.get::<Option<i64>>(10).map_err(internal)?.map(|w| w as u32),
        native_height: row.get::<Option<i64>>(11).map_err(internal)?.map(|h| h as u32),
        created_at: parse_rfc3339(&row.get::<String>(12).map_err(internal)?)?,
    })
}

fn row_to_research_session(row: &libsql::Row) -> Result<ResearchSession> {
    let messages_raw = row.get::<String>(4).map_err(internal)?;
    let messages: Vec<ResearchMessage> = serde_json::from_str(&messages_raw).map_err(internal)?;
    Ok(ResearchSession {
        id: row.get::<String>(0).map_err(internal)?,
        user_id: row.get::<String>(1).map_err(internal)?,
        space_id: row.get::<String>(2).map_err(internal)?,
        title: row.get::<Option<String>>(3).map_err(internal)?,
        messages,
        created_at: parse_rfc3339(&row.get::<String>(5).map_err(internal)?)?,
        updated_at: parse_rfc3339(&row.get::<String>(6).map_err(internal)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceType;

    async fn test_store() -> MetaStore {
        let store = MetaStore::open_local(":memory:").await.unwrap();
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn create_user_also_creates_default_space() {
        let store = test_store().await;
        let user = store.create_user("alice@example.com").await.unwrap();
        let spaces = store.list_spaces(&user.id).await.unwrap();
        assert_eq!(spaces.len(), 1);
        assert!(spaces[0].is_default);
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let store = test_store().await;
        store.create_user("alice@example.com").await.unwrap();
        let err = store.create_user("ALICE@example.com").await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn ingest_then_delete_document_cascades() {
        let store = test_store().await;
        let user = store.create_user("bob@example.com").await.unwrap();
        let space = store.list_spaces(&user.id).await.unwrap().remove(0);

        let doc = Document {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            space_id: space.id.clone(),
            source_type: SourceType::Text,
            file_name: "notes.txt".into(),
            blob_url: None,
            metadata: Default::default(),
            created_at: Utc::now(),
        };
        let chunk = Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: doc.id.clone(),
            chunk_index: 0,
            content: "hello world".into(),
            embedding: Some(vec![0.1, 0.2]),
            char_count: 11,
            created_at: Utc::now(),
        };
        store.ingest_document(&doc, &[chunk], &[]).await.unwrap();

        let chunks = store.list_chunks(&doc.id).await.unwrap();
        assert_eq!(chunks.len(), 1);

        store.delete_document(&user.id, &space.id, &doc.id).await.unwrap();
        let chunks_after = store.list_chunks(&doc.id).await.unwrap();
        assert!(chunks_after.is_empty());
    }

    #[tokio::test]
    async fn non_contiguous_chunk_index_is_rejected() {
        let store = test_store().await;
        let user = store.create_user("carol@example.com").await.unwrap();
        let space = store.list_spaces(&user.id).await.unwrap().remove(0);
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            space_id: space.id.clone(),
            source_type: SourceType::Text,
            file_name: "a.txt".into(),
            blob_url: None,
            metadata: Default::default(),
            created_at: Utc::now(),
        };
        let bad_chunk = Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: doc.id.clone(),
            chunk_index: 5,
            content: "oops".into(),
            embedding: None,
            char_count: 4,
            created_at: Utc::now(),
        };
        let err = store.ingest_document(&doc, &[bad_chunk], &[]).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
