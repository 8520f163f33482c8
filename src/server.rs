//! HTTP API for document upload, listing and retrieval queries.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/documents/upload` | Multipart upload (field `file`), runs the ingestion pipeline |
//! | `GET`  | `/api/documents` | The caller's documents, newest first |
//! | `GET`  | `/api/documents/{id}` | One document with content and chunks |
//! | `POST` | `/api/documents/query` | Ask the retrieval service a question |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "empty file" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embeddings_disabled` (400), `not_found` (404),
//! `too_large` (413), `upstream_error` (502), `internal` (500).
//!
//! # Identity
//!
//! Authentication is not part of this server. The `X-User-Id` header names the
//! caller; a missing or non-UUID value falls back to [`OwnerId::DEV`].

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartError, DefaultBodyLimit, FromRequestParts, Multipart, Path, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{Config, QueryConfig};
use crate::error::IngestError;
use crate::ingest::Ingestor;
use crate::models::{format_ts_iso, Document, OwnerId};
use crate::rag::{GatewayError, QueryAnswer};
use crate::sanitize::sanitize_query;
use crate::validate::Upload;
use crate::{db, migrate};

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Allowance for multipart boundaries and part headers on top of the file.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    ingestor: Arc<Ingestor>,
    max_upload_bytes: u64,
    query: QueryConfig,
}

impl AppState {
    pub fn new(ingestor: Arc<Ingestor>, max_upload_bytes: u64, query: QueryConfig) -> Self {
        Self {
            ingestor,
            max_upload_bytes,
            query,
        }
    }
}

/// Build the router. The request body is hard-limited to the upload cap plus
/// multipart overhead, whatever size the client declares.
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD)
        .min(usize::MAX as u64) as usize;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/documents/upload", post(handle_upload))
        .route("/api/documents/query", post(handle_query))
        .route("/api/documents", get(handle_list))
        .route("/api/documents/{id}", get(handle_get))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;

    if !config.rag.is_enabled() {
        info!("rag.base_url not set; uploads will not be embedded");
    }

    let ingestor = Ingestor::from_config(config, pool)?.with_span(tracing::info_span!("uploads"));
    let state = AppState::new(
        Arc::new(ingestor),
        config.storage.max_upload_bytes,
        config.query.clone(),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "docsense listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}

// ============ Identity ============

/// Caller identity taken from [`USER_ID_HEADER`], defaulting to [`OwnerId::DEV`].
pub struct DevOwner(pub OwnerId);

impl<S: Send + Sync> FromRequestParts<S> for DevOwner {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(OwnerId::parse)
            .unwrap_or(OwnerId::DEV);
        Ok(DevOwner(owner))
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

fn too_large(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "too_large", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        if err.is_too_large() {
            too_large(err.public_message())
        } else if err.is_client_fault() {
            bad_request(err.public_message())
        } else {
            error!(error = %err, "ingestion failed");
            internal(err.public_message())
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            too_large("file too large")
        } else {
            bad_request(err.body_text())
        }
    }
}

fn storage_error(err: anyhow::Error) -> AppError {
    error!(error = %format!("{err:#}"), "document store query failed");
    internal("failed to load documents")
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/documents/upload ============

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document_id: String,
}

/// Reads the `file` part and runs it through the ingestion pipeline.
///
/// The part is buffered in memory; the router's body limit caps its size.
async fn handle_upload(
    State(state): State<AppState>,
    DevOwner(owner): DevOwner,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        let upload = Upload {
            filename,
            content_type,
            declared_size: bytes.len() as u64,
            reader: &bytes[..],
        };
        let outcome = state
            .ingestor
            .ingest(&owner, upload, state.max_upload_bytes)
            .await?;

        return Ok(Json(UploadResponse {
            document_id: outcome.document_id,
        }));
    }

    Err(bad_request("missing multipart field 'file'"))
}

// ============ GET /api/documents ============

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub status: String,
    pub checksum_sha256: String,
    pub created_at: String,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            filename: doc.filename.clone(),
            mime_type: doc.mime_type.clone(),
            size_bytes: doc.size_bytes,
            status: doc.status.to_string(),
            checksum_sha256: doc.checksum_sha256.clone(),
            created_at: format_ts_iso(doc.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<DocumentSummary>,
}

async fn handle_list(
    State(state): State<AppState>,
    DevOwner(owner): DevOwner,
) -> Result<Json<DocumentList>, AppError> {
    let docs = state
        .ingestor
        .store()
        .list_documents(&owner)
        .await
        .map_err(storage_error)?;

    Ok(Json(DocumentList {
        documents: docs.iter().map(DocumentSummary::from).collect(),
    }))
}

// ============ GET /api/documents/{id} ============

#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkResponse {
    pub index: i64,
    pub text: String,
    pub token_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponse {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    pub title: Option<String>,
    pub source_type: String,
    pub updated_at: String,
    pub metadata: serde_json::Value,
    pub content: Option<String>,
    pub chunks: Vec<ChunkResponse>,
}

/// Documents belonging to another owner are reported as not found.
async fn handle_get(
    State(state): State<AppState>,
    DevOwner(owner): DevOwner,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    let store = state.ingestor.store();
    let doc = store
        .get_document(&id)
        .await
        .map_err(storage_error)?
        .filter(|d| d.owner_id == owner.to_string())
        .ok_or_else(|| not_found(format!("document not found: {}", id)))?;

    let content = store.get_content(&id).await.map_err(storage_error)?;
    let chunks = store
        .list_chunks(&id)
        .await
        .map_err(storage_error)?
        .into_iter()
        .map(|c| ChunkResponse {
            index: c.chunk_index,
            text: c.text,
            token_count: c.token_count,
        })
        .collect();

    Ok(Json(DocumentResponse {
        summary: DocumentSummary::from(&doc),
        title: doc.title,
        source_type: doc.source_type,
        updated_at: format_ts_iso(doc.updated_at),
        metadata: doc.metadata,
        content,
        chunks,
    }))
}

// ============ POST /api/documents/query ============

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

async fn handle_query(
    State(state): State<AppState>,
    DevOwner(_owner): DevOwner,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryAnswer>, AppError> {
    let query = sanitize_query(&req.query).map_err(|e| bad_request(e.to_string()))?;
    let top_k = state.query.resolve_top_k(req.top_k);

    match state.ingestor.gateway().query(&query, top_k).await {
        Ok(answer) => Ok(Json(answer)),
        Err(GatewayError::Disabled) => Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "embeddings_disabled",
            "retrieval service is not configured",
        )),
        Err(e) => {
            error!(error = %e, "query failed");
            Err(AppError::new(
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "retrieval service request failed",
            ))
        }
    }
}
