//! Client for the external retrieval/embedding service.
//!
//! Defines the [`EmbeddingGateway`] trait and two implementations:
//! - **[`HttpGateway`]** calls `POST {base_url}/embed` and `POST {base_url}/query`.
//! - **[`DisabledGateway`]** fails every call; used when no service is configured.
//!
//! Use [`create_gateway`] to pick one from configuration. The client performs
//! a single attempt per call: there is no retry or backoff, and any non-2xx
//! response becomes [`GatewayError::Status`] carrying the response body.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RagConfig;

/// One chunk handed to the service for embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkIn {
    pub chunk_id: String,
    pub chunk_index: i64,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    document_id: &'a str,
    chunks: &'a [ChunkIn],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    upserted: usize,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    top_k: usize,
}

/// Source reference attached to an answer. Linkage fields are present only
/// when the service knows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub chunk_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_snippet: Option<String>,
}

/// A ranked retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub matches: Vec<RetrievedChunk>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("embedding service is not configured")]
    Disabled,

    #[error("request to embedding service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response from embedding service: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Boundary to the retrieval/embedding service.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Submit a document's chunks; returns the number the service upserted.
    async fn embed(&self, document_id: &str, chunks: &[ChunkIn]) -> Result<usize, GatewayError>;

    /// Ask a free-text question over indexed chunks.
    async fn query(&self, text: &str, top_k: usize) -> Result<QueryAnswer, GatewayError>;
}

/// Gateway used when `rag.base_url` is not set.
pub struct DisabledGateway;

#[async_trait]
impl EmbeddingGateway for DisabledGateway {
    async fn embed(&self, _document_id: &str, _chunks: &[ChunkIn]) -> Result<usize, GatewayError> {
        Err(GatewayError::Disabled)
    }

    async fn query(&self, _text: &str, _top_k: usize) -> Result<QueryAnswer, GatewayError> {
        Err(GatewayError::Disabled)
    }
}

/// JSON-over-HTTP gateway client.
///
/// The configured timeout bounds each request on its own, independently of
/// any deadline the caller wraps around the call.
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post_json<B: Serialize + ?Sized, T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl EmbeddingGateway for HttpGateway {
    async fn embed(&self, document_id: &str, chunks: &[ChunkIn]) -> Result<usize, GatewayError> {
        let body = EmbedRequest {
            document_id,
            chunks,
        };
        let response: EmbedResponse = self.post_json("embed", &body).await?;
        Ok(response.upserted)
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<QueryAnswer, GatewayError> {
        let body = QueryRequest { query: text, top_k };
        self.post_json("query", &body).await
    }
}

/// Create the gateway matching the configuration.
///
/// | `rag.base_url` | Gateway |
/// |----------------|---------|
/// | absent / blank | [`DisabledGateway`] |
/// | set | [`HttpGateway`] |
pub fn create_gateway(config: &RagConfig) -> Result<Arc<dyn EmbeddingGateway>> {
    match config.base_url.as_deref() {
        Some(url) if config.is_enabled() => Ok(Arc::new(HttpGateway::new(
            url,
            Duration::from_secs(config.timeout_secs),
        )?)),
        _ => Ok(Arc::new(DisabledGateway)),
    }
}
