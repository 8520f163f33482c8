//! Command implementations for the `docsense` binary.
//!
//! Each `run_*` function opens what it needs from the config, does one job,
//! and prints a plain-text report to stdout.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::ingest::Ingestor;
use crate::models::{format_ts_iso, OwnerId};
use crate::rag::create_gateway;
use crate::sanitize::sanitize_query;
use crate::store::{DocumentStore, SqliteStore};
use crate::validate::Upload;
use crate::{db, migrate};

pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    std::fs::create_dir_all(&config.storage.root).with_context(|| {
        format!(
            "Failed to create storage root: {}",
            config.storage.root.display()
        )
    })?;
    pool.close().await;
    println!("Database initialized successfully.");
    Ok(())
}

/// Run the full ingestion pipeline on a local file.
pub async fn run_ingest(
    config: &Config,
    path: &Path,
    owner: &OwnerId,
    content_type: Option<String>,
) -> Result<()> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let declared_size = file.metadata().await?.len();

    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let ingestor = Ingestor::from_config(config, pool.clone())?;

    let upload = Upload {
        filename,
        content_type,
        declared_size,
        reader: file,
    };
    let outcome = ingestor
        .ingest(owner, upload, config.storage.max_upload_bytes)
        .await?;
    pool.close().await;

    println!("ingest {}", path.display());
    println!("  document_id: {}", outcome.document_id);
    println!("  chunks: {}", outcome.chunk_count);
    println!("  status: {}", outcome.status);
    println!("ok");
    Ok(())
}

pub async fn run_documents(config: &Config, owner: &OwnerId) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool.clone());
    let docs = store.list_documents(owner).await?;
    pool.close().await;

    if docs.is_empty() {
        println!("No documents for owner {}.", owner);
        return Ok(());
    }

    println!(
        "{:<36}  {:<8}  {:>10}  {:<20}  FILENAME",
        "ID", "STATUS", "BYTES", "CREATED"
    );
    for doc in &docs {
        println!(
            "{:<36}  {:<8}  {:>10}  {:<20}  {}",
            doc.id,
            doc.status,
            doc.size_bytes,
            format_ts_iso(doc.created_at),
            doc.filename
        );
    }
    Ok(())
}

/// Print one document with its content and chunks.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let Some(doc) = store.get_document(id).await? else {
        pool.close().await;
        bail!("document not found: {}", id);
    };
    let content = store.get_content(id).await?;
    let chunks = store.list_chunks(id).await?;
    pool.close().await;

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("owner:        {}", doc.owner_id);
    println!("filename:     {}", doc.filename);
    println!("mime_type:    {}", doc.mime_type);
    println!("size_bytes:   {}", doc.size_bytes);
    println!("sha256:       {}", doc.checksum_sha256);
    println!("status:       {}", doc.status);
    println!("storage_path: {}", doc.storage_path);
    println!("created_at:   {}", format_ts_iso(doc.created_at));
    println!("metadata:     {}", doc.metadata);
    println!();

    println!("--- Content ---");
    println!("{}", content.as_deref().unwrap_or("(none)"));
    println!();

    println!("--- Chunks ({}) ---", chunks.len());
    for chunk in &chunks {
        println!("[chunk {}] {} ({} tokens)", chunk.chunk_index, chunk.id, chunk.token_count);
        println!("{}", chunk.text);
        println!();
    }

    Ok(())
}

/// Ask the retrieval service a question and print the answer with citations.
pub async fn run_query(config: &Config, text: &str, top_k: Option<usize>) -> Result<()> {
    let query = sanitize_query(text).map_err(|e| anyhow::anyhow!("invalid query: {}", e))?;
    let top_k = config.query.resolve_top_k(top_k);
    let gateway = create_gateway(&config.rag)?;

    let answer = gateway.query(&query, top_k).await?;

    println!("{}", answer.answer);
    if !answer.citations.is_empty() {
        println!();
        println!("--- Citations ({}) ---", answer.citations.len());
        for (i, c) in answer.citations.iter().enumerate() {
            let location = match (&c.document_id, c.chunk_index) {
                (Some(doc), Some(idx)) => format!("{} #{}", doc, idx),
                (Some(doc), None) => doc.clone(),
                _ => "unknown document".to_string(),
            };
            println!("{}. chunk {} ({})", i + 1, c.chunk_id, location);
            if let Some(snippet) = &c.text_snippet {
                println!("   {}", snippet);
            }
        }
    }
    Ok(())
}
