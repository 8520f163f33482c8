use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::{ChunkParams, OVERLAP_TOKENS, WINDOW_TOKENS};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_max_upload_bytes() -> u64 {
    25 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_tokens")]
    pub window_tokens: usize,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_tokens: WINDOW_TOKENS,
            overlap_tokens: OVERLAP_TOKENS,
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkParams {
        ChunkParams {
            window: self.window_tokens,
            overlap: self.overlap_tokens,
        }
    }
}

fn default_window_tokens() -> usize {
    WINDOW_TOKENS
}
fn default_overlap_tokens() -> usize {
    OVERLAP_TOKENS
}

/// Retrieval/embedding service. Without `base_url` embedding is skipped.
#[derive(Debug, Deserialize, Clone)]
pub struct RagConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RagConfig {
    pub fn is_enabled(&self) -> bool {
        self.base_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

impl QueryConfig {
    /// Apply the default and clamp into `[1, max_top_k]`.
    pub fn resolve_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_top_k)
            .clamp(1, self.max_top_k.max(1))
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_top_k() -> usize {
    50
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a TOML config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.storage.max_upload_bytes == 0 {
        anyhow::bail!("storage.max_upload_bytes must be > 0");
    }

    // Validate chunking
    if config.chunking.window_tokens == 0 {
        anyhow::bail!("chunking.window_tokens must be > 0");
    }
    if config.chunking.overlap_tokens >= config.chunking.window_tokens {
        anyhow::bail!("chunking.overlap_tokens must be < chunking.window_tokens");
    }

    // Validate rag
    if config.rag.timeout_secs == 0 {
        anyhow::bail!("rag.timeout_secs must be > 0");
    }
    if let Some(url) = &config.rag.base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("rag.base_url must be an http(s) URL, got '{}'", url);
        }
    }

    // Validate query
    if config.query.max_top_k == 0 {
        anyhow::bail!("query.max_top_k must be >= 1");
    }
    if config.query.default_top_k == 0 || config.query.default_top_k > config.query.max_top_k {
        anyhow::bail!("query.default_top_k must be in [1, query.max_top_k]");
    }

    Ok(config)
}
