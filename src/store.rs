//! Persistence boundary for documents, extracted content and chunks.
//!
//! The ingestion pipeline talks to [`DocumentStore`]; [`SqliteStore`] is the
//! production implementation on top of the `sqlx` pool. Every write is keyed
//! by document id, and a document's chunk set is inserted inside a single
//! transaction.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{Chunk, Document, DocumentStatus, NewDocument, OwnerId, StoredChunk};

/// Source type recorded for documents that arrive through upload.
pub const SOURCE_UPLOAD: &str = "upload";

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or update a document's metadata, keyed by id. New rows start in
    /// [`DocumentStatus::Uploaded`]; an existing row keeps its status.
    async fn upsert_document(&self, doc: &NewDocument) -> Result<()>;

    /// Insert or replace the extracted text of a document.
    async fn upsert_content(&self, document_id: &str, text: &str) -> Result<()>;

    /// Insert all chunks of one document atomically: either every row is
    /// committed or none is.
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// Identifier assigned to a persisted chunk.
    async fn chunk_id(&self, document_id: &str, chunk_index: i64) -> Result<Option<String>>;

    /// Set a document's status. Fails if the document does not exist.
    async fn update_status(&self, document_id: &str, status: DocumentStatus) -> Result<()>;

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>>;

    /// Documents owned by `owner`, newest first.
    async fn list_documents(&self, owner: &OwnerId) -> Result<Vec<Document>>;

    async fn get_content(&self, document_id: &str) -> Result<Option<String>>;

    /// Chunks of a document in index order.
    async fn list_chunks(&self, document_id: &str) -> Result<Vec<StoredChunk>>;
}

/// [`DocumentStore`] backed by SQLite.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const DOCUMENT_COLUMNS: &str = "id, owner_id, title, source_type, filename, storage_path, \
     mime_type, size_bytes, checksum_sha256, status, metadata_json, created_at, updated_at";

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let status: String = row.get("status");
    let id: String = row.get("id");
    let metadata_json: String = row.get("metadata_json");
    let metadata: serde_json::Value = serde_json::from_str(&metadata_json)
        .with_context(|| format!("corrupt metadata_json for document {}", id))?;

    Ok(Document {
        id,
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        source_type: row.get("source_type"),
        filename: row.get("filename"),
        storage_path: row.get("storage_path"),
        mime_type: row.get("mime_type"),
        size_bytes: row.get("size_bytes"),
        checksum_sha256: row.get("checksum_sha256"),
        status: status.parse()?,
        metadata,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn upsert_document(&self, doc: &NewDocument) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let metadata_json = serde_json::to_string(&doc.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, title, source_type, filename, storage_path, mime_type, size_bytes, checksum_sha256, status, metadata_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                filename = excluded.filename,
                mime_type = excluded.mime_type,
                size_bytes = excluded.size_bytes,
                checksum_sha256 = excluded.checksum_sha256,
                metadata_json = excluded.metadata_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doc.id)
        .bind(doc.owner_id.to_string())
        .bind(&doc.filename)
        .bind(SOURCE_UPLOAD)
        .bind(&doc.filename)
        .bind(&doc.storage_path)
        .bind(&doc.mime_type)
        .bind(doc.size_bytes)
        .bind(&doc.checksum_sha256)
        .bind(DocumentStatus::Uploaded.as_str())
        .bind(&metadata_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("upsert document {}", doc.id))?;

        Ok(())
    }

    async fn upsert_content(&self, document_id: &str, text: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO document_contents (document_id, content_text, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET content_text = excluded.content_text, updated_at = excluded.updated_at
            "#,
        )
        .bind(document_id)
        .bind(text)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("upsert content for document {}", document_id))?;

        Ok(())
    }

    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO document_chunks (id, document_id, chunk_index, text, token_count, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(chunk.token_count)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!(
                    "insert chunk {} of document {}",
                    chunk.chunk_index, chunk.document_id
                )
            })?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn chunk_id(&self, document_id: &str, chunk_index: i64) -> Result<Option<String>> {
        let id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM document_chunks WHERE document_id = ? AND chunk_index = ?",
        )
        .bind(document_id)
        .bind(chunk_index)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update_status(&self, document_id: &str, status: DocumentStatus) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("UPDATE documents SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now)
            .bind(document_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            bail!("document not found: {}", document_id);
        }
        Ok(())
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn list_documents(&self, owner: &OwnerId) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC",
            DOCUMENT_COLUMNS
        ))
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn get_content(&self, document_id: &str) -> Result<Option<String>> {
        let text: Option<String> =
            sqlx::query_scalar("SELECT content_text FROM document_contents WHERE document_id = ?")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(text)
    }

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<StoredChunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, text, token_count FROM document_chunks WHERE document_id = ? ORDER BY chunk_index ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| StoredChunk {
                id: row.get("id"),
                document_id: row.get("document_id"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                token_count: row.get("token_count"),
            })
            .collect())
    }
}
