//! Error taxonomy for the ingestion pipeline.
//!
//! Each pipeline step fails with its own [`IngestError`] variant so the HTTP
//! boundary can tell client faults (bad upload) from oversized payloads and
//! from server-side failures without inspecting message text.

use thiserror::Error;

use crate::extract::ExtractError;

/// Rejection reasons produced by [`validate_upload`](crate::validate::validate_upload).
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("empty file")]
    Empty,

    #[error("file too large: {size} bytes exceeds the {max}-byte limit")]
    TooLarge { size: u64, max: u64 },

    #[error("unsupported file type '{filename}': only PDF, TXT, and MD files are supported")]
    UnsupportedType { filename: String },

    #[error("invalid PDF signature")]
    BadSignature,

    #[error("unable to read file: {0}")]
    Unreadable(#[source] std::io::Error),
}

impl ValidationError {
    /// Stable machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::Empty => "empty",
            ValidationError::TooLarge { .. } => "too_large",
            ValidationError::UnsupportedType { .. } => "unsupported_type",
            ValidationError::BadSignature => "bad_signature",
            ValidationError::Unreadable(_) => "unreadable",
        }
    }
}

/// Failures of the [`AtomicStore`](crate::storage::AtomicStore).
#[derive(Debug, Error)]
pub enum StorageError {
    /// The byte stream ran past the hard cap while being copied.
    #[error("upload exceeded the {max}-byte limit while being written")]
    TooLarge { max: u64 },

    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single ingestion call, tagged with the step that failed.
///
/// Persistence failures carry the store's `anyhow::Error`; they are formatted
/// with `{:#}` so the full context chain reaches the logs.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to save file: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to calculate file checksum: {0}")]
    Checksum(#[source] std::io::Error),

    #[error("failed to persist metadata: {0:#}")]
    Metadata(anyhow::Error),

    #[error("failed to extract document text: {0}")]
    Extraction(#[from] ExtractError),

    #[error("failed to persist document content: {0:#}")]
    Content(anyhow::Error),

    #[error("failed to persist document chunks: {0:#}")]
    Chunks(anyhow::Error),

    #[error("failed to update document status: {0:#}")]
    Status(anyhow::Error),
}

impl IngestError {
    /// True when the caller sent something we refuse to ingest.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, IngestError::Validation(_))
    }

    /// True for both the declared-size rejection and the mid-stream cap.
    pub fn is_too_large(&self) -> bool {
        matches!(
            self,
            IngestError::Validation(ValidationError::TooLarge { .. })
                | IngestError::Storage(StorageError::TooLarge { .. })
        )
    }

    /// Message safe to hand back to a client: no paths, no SQL.
    pub fn public_message(&self) -> String {
        match self {
            IngestError::Validation(e) => e.to_string(),
            IngestError::Storage(StorageError::TooLarge { .. }) => "file too large".to_string(),
            IngestError::Storage(_) => "failed to save file".to_string(),
            IngestError::Checksum(_) => "failed to calculate file checksum".to_string(),
            IngestError::Metadata(_) => "failed to persist metadata".to_string(),
            IngestError::Extraction(_) => "failed to extract document text".to_string(),
            IngestError::Content(_) => "failed to persist document content".to_string(),
            IngestError::Chunks(_) => "failed to persist document chunks".to_string(),
            IngestError::Status(_) => "failed to update document status".to_string(),
        }
    }
}
