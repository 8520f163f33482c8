//! Ingestion pipeline orchestration.
//!
//! [`Ingestor::ingest`] runs one upload end to end inside the caller's task:
//! validate → store → checksum → metadata → extract → content → chunk →
//! chunk persist → embed (non-fatal) → mark `ready`.
//!
//! Failure policy per step:
//!
//! | Step | On failure |
//! |------|------------|
//! | validate, store | return; nothing left behind |
//! | checksum, metadata, extract, content | delete the stored file, return |
//! | chunk persist | return; file and earlier rows stay |
//! | embed | log and continue |
//! | status update | return the error; data stays persisted |
//!
//! There is no `failed` status. A failure after the metadata row is written
//! leaves that row in `uploaded`, and for the extract/content steps it then
//! points at a deleted file. Whether to persist an explicit failed state
//! instead is an open product decision.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn, Instrument, Span};
use uuid::Uuid;

use crate::checksum::sha256_file;
use crate::chunk::{chunk_text, ChunkParams};
use crate::config::Config;
use crate::error::IngestError;
use crate::extract::{normalize_mime, ContentExtractor, FileExtractor, MIME_PDF, MIME_UNKNOWN};
use crate::models::{Chunk, DocumentStatus, NewDocument, OwnerId};
use crate::rag::{create_gateway, ChunkIn, EmbeddingGateway, GatewayError};
use crate::sanitize::sanitize_filename;
use crate::storage::AtomicStore;
use crate::store::{DocumentStore, SqliteStore};
use crate::validate::{validate_upload, FileKind, Upload};

/// Result of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub document_id: String,
    pub chunk_count: usize,
    pub status: DocumentStatus,
}

/// Sequences the ingestion pipeline over injected collaborators.
pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    files: AtomicStore,
    extractor: Arc<dyn ContentExtractor>,
    gateway: Arc<dyn EmbeddingGateway>,
    chunking: ChunkParams,
    span: Span,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        files: AtomicStore,
        extractor: Arc<dyn ContentExtractor>,
        gateway: Arc<dyn EmbeddingGateway>,
        chunking: ChunkParams,
    ) -> Self {
        Self {
            store,
            files,
            extractor,
            gateway,
            chunking,
            span: Span::none(),
        }
    }

    /// Production wiring: SQLite store, local files, `pdf-extract`, and the
    /// gateway selected by `[rag]`.
    pub fn from_config(config: &Config, pool: SqlitePool) -> anyhow::Result<Self> {
        Ok(Self::new(
            Arc::new(SqliteStore::new(pool)),
            AtomicStore::new(&config.storage.root),
            Arc::new(FileExtractor),
            create_gateway(&config.rag)?,
            config.chunking.params(),
        ))
    }

    /// Parent span for every ingestion run by this instance.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn files(&self) -> &AtomicStore {
        &self.files
    }

    pub fn gateway(&self) -> &Arc<dyn EmbeddingGateway> {
        &self.gateway
    }

    /// Ingest one upload for `owner`, accepting at most `max_bytes`.
    ///
    /// On success the document, its content and its chunks are persisted and
    /// the document is `ready`. Embedding into the external index is not part
    /// of that guarantee.
    pub async fn ingest<R>(
        &self,
        owner: &OwnerId,
        upload: Upload<R>,
        max_bytes: u64,
    ) -> Result<IngestOutcome, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let document_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            parent: &self.span,
            "ingest",
            document_id = %document_id,
            owner_id = %owner,
        );
        self.run(document_id, owner, upload, max_bytes)
            .instrument(span)
            .await
    }

    async fn run<R>(
        &self,
        document_id: String,
        owner: &OwnerId,
        upload: Upload<R>,
        max_bytes: u64,
    ) -> Result<IngestOutcome, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let validated = validate_upload(upload, max_bytes).await.map_err(|e| {
            info!(reason = e.reason(), "upload rejected");
            e
        })?;

        let filename = sanitize_filename(&validated.filename);
        let declared_mime = validated
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(MIME_UNKNOWN)
            .to_string();
        let extract_mime = self.extraction_mime(&declared_mime, validated.kind);

        let storage_path = AtomicStore::relative_path(owner, &document_id, &filename);
        let absolute = self.files.absolute_path(&storage_path)?;
        let size = self
            .files
            .write(&storage_path, validated.into_reader(), max_bytes)
            .await?;
        debug!(path = %storage_path, bytes = size, "upload stored");

        let checksum = match sha256_file(&absolute).await {
            Ok(c) => c,
            Err(e) => {
                self.discard(&storage_path).await;
                return Err(IngestError::Checksum(e));
            }
        };

        let mut metadata = serde_json::Map::new();
        metadata.insert("original_filename".into(), filename.clone().into());
        metadata.insert("storage".into(), "local".into());

        let doc = NewDocument {
            id: document_id.clone(),
            owner_id: *owner,
            filename,
            storage_path: storage_path.clone(),
            mime_type: declared_mime,
            size_bytes: size as i64,
            checksum_sha256: checksum,
            metadata,
        };
        if let Err(e) = self.store.upsert_document(&doc).await {
            self.discard(&storage_path).await;
            return Err(IngestError::Metadata(e));
        }

        let text = match self.extractor.extract(&absolute, &extract_mime).await {
            Ok(t) => t,
            Err(e) => {
                self.discard(&storage_path).await;
                return Err(IngestError::Extraction(e));
            }
        };

        if let Err(e) = self.store.upsert_content(&document_id, &text).await {
            self.discard(&storage_path).await;
            return Err(IngestError::Content(e));
        }

        let chunks = chunk_text(&document_id, &text, &self.chunking);
        if !chunks.is_empty() {
            self.store
                .insert_chunks(&chunks)
                .await
                .map_err(IngestError::Chunks)?;
            self.embed_chunks(&document_id, &chunks).await;
        }

        self.store
            .update_status(&document_id, DocumentStatus::Ready)
            .await
            .map_err(IngestError::Status)?;

        info!(chunks = chunks.len(), bytes = size, "document ready");
        Ok(IngestOutcome {
            document_id,
            chunk_count: chunks.len(),
            status: DocumentStatus::Ready,
        })
    }

    /// Declared type when the extractor handles it and it agrees with the
    /// validated extension about being a PDF, else the extension's type.
    fn extraction_mime(&self, declared: &str, kind: FileKind) -> String {
        let declared = normalize_mime(declared);
        let agrees = (declared == MIME_PDF) == (kind == FileKind::Pdf);
        if agrees && self.extractor.supports(&declared) {
            declared
        } else {
            kind.mime_type().to_string()
        }
    }

    /// Hand persisted chunks to the gateway. Never fails the ingestion.
    async fn embed_chunks(&self, document_id: &str, chunks: &[Chunk]) {
        let mut batch = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match self.store.chunk_id(document_id, chunk.chunk_index).await {
                Ok(Some(id)) => batch.push(ChunkIn {
                    chunk_id: id,
                    chunk_index: chunk.chunk_index,
                    text: chunk.text.clone(),
                }),
                Ok(None) => warn!(chunk_index = chunk.chunk_index, "chunk id not found"),
                Err(e) => warn!(
                    chunk_index = chunk.chunk_index,
                    error = %format!("{e:#}"),
                    "failed to resolve chunk id"
                ),
            }
        }
        if batch.is_empty() {
            return;
        }

        match self.gateway.embed(document_id, &batch).await {
            Ok(upserted) => info!(upserted, "chunks embedded"),
            Err(GatewayError::Disabled) => debug!("embedding disabled, skipping"),
            Err(e) => warn!(error = %e, "embedding failed, continuing"),
        }
    }

    async fn discard(&self, storage_path: &str) {
        if let Err(e) = self.files.remove(storage_path).await {
            warn!(path = %storage_path, error = %e, "failed to delete stored file");
        }
    }
}
