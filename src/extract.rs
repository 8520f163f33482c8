//! Plain-text extraction for stored uploads.
//!
//! The pipeline reaches extraction only through [`ContentExtractor`]; the
//! default [`FileExtractor`] reads the stored file and returns UTF-8 text for
//! PDF, plain text and markdown (markdown is passed through as plain text).

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// Stored when the client did not declare a content type.
pub const MIME_UNKNOWN: &str = "application/octet-stream";

/// Extraction error. Extraction never panics on malformed input.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("failed to read stored file: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Strip parameters (`; charset=utf-8`) and case from a MIME type.
pub fn normalize_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Converts a stored file into plain text, keyed by MIME type.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Whether [`extract`](Self::extract) handles this (normalized) MIME type.
    fn supports(&self, mime_type: &str) -> bool;

    async fn extract(&self, path: &Path, mime_type: &str) -> Result<String, ExtractError>;
}

/// Default extractor backed by the local filesystem and `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

#[async_trait]
impl ContentExtractor for FileExtractor {
    fn supports(&self, mime_type: &str) -> bool {
        matches!(mime_type, MIME_PDF | MIME_TEXT | MIME_MARKDOWN)
    }

    async fn extract(&self, path: &Path, mime_type: &str) -> Result<String, ExtractError> {
        let mime = normalize_mime(mime_type);
        if !self.supports(&mime) {
            return Err(ExtractError::UnsupportedContentType(mime));
        }

        let bytes = tokio::fs::read(path).await?;
        if mime == MIME_PDF {
            // PDF parsing is CPU-bound and synchronous.
            return tokio::task::spawn_blocking(move || extract_text(&bytes, MIME_PDF)).await?;
        }
        extract_text(&bytes, &mime)
    }
}

/// Extracts plain text from in-memory content.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_TEXT | MIME_MARKDOWN => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}
