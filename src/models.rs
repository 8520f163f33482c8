//! Core data models used throughout docsense.
//!
//! These types represent the owners, documents, extracted content and chunks
//! that flow through the ingestion pipeline and out through the HTTP API.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::Serialize;
use uuid::Uuid;

/// Verified identity of the user who owns a document.
///
/// Handed to the pipeline by the authentication layer. Always a UUID, which
/// also makes it safe to use as a storage directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(Uuid);

impl OwnerId {
    /// Owner used by the development identity extractor.
    pub const DEV: OwnerId = OwnerId(Uuid::from_u128(1));

    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OwnerId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match OwnerId::parse(s) {
            Some(id) => Ok(id),
            None => bail!("owner id must be a UUID, got '{}'", s),
        }
    }
}

/// Lifecycle state of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Bytes are stored and metadata is committed.
    Uploaded,
    /// Content and chunks are persisted.
    Ready,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Ready => "ready",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "uploaded" => Ok(DocumentStatus::Uploaded),
            "ready" => Ok(DocumentStatus::Ready),
            other => bail!("unknown document status: '{}'", other),
        }
    }
}

/// Metadata row written once the uploaded bytes are durably stored.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub owner_id: OwnerId,
    /// Sanitized filename; also used as the title.
    pub filename: String,
    /// Path relative to the storage root.
    pub storage_path: String,
    /// Content type as declared by the client.
    pub mime_type: String,
    pub size_bytes: i64,
    pub checksum_sha256: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Document row as read back from the store.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub title: Option<String>,
    pub source_type: String,
    pub filename: String,
    pub storage_path: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub checksum_sha256: String,
    pub status: DocumentStatus,
    pub metadata: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A window of a document's extracted text, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    /// Word count of `text`.
    pub token_count: i64,
}

/// A chunk as stored, with the identifier assigned at insert time.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub token_count: i64,
}

/// Render unix seconds as an ISO 8601 UTC timestamp.
pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_id_round_trips_through_display() {
        let id = OwnerId::new(Uuid::new_v4());
        assert_eq!(OwnerId::parse(&id.to_string()), Some(id));
    }

    #[test]
    fn owner_id_rejects_paths() {
        assert!(OwnerId::parse("../../etc").is_none());
        assert!(OwnerId::parse("").is_none());
        assert!("not-a-uuid".parse::<OwnerId>().is_err());
    }

    #[test]
    fn dev_owner_is_fixed() {
        assert_eq!(
            OwnerId::DEV.to_string(),
            "00000000-0000-0000-0000-000000000001"
        );
    }

    #[test]
    fn timestamps_render_as_utc() {
        assert_eq!(format_ts_iso(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_ts_iso(1_700_000_000), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn status_parses() {
        assert_eq!("ready".parse::<DocumentStatus>().unwrap(), DocumentStatus::Ready);
        assert_eq!(DocumentStatus::Uploaded.to_string(), "uploaded");
        assert!("failed".parse::<DocumentStatus>().is_err());
    }
}
