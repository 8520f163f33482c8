//! # docsense CLI
//!
//! The `docsense` binary runs the document ingestion pipeline from the
//! command line and serves the HTTP upload API.
//!
//! ## Usage
//!
//! ```bash
//! docsense --config ./config/docsense.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsense init` | Create the SQLite database, schema and storage root |
//! | `docsense ingest <path>` | Validate, store, chunk and embed a local file |
//! | `docsense documents` | List an owner's documents |
//! | `docsense get <id>` | Print a document with its content and chunks |
//! | `docsense query "<text>"` | Ask the retrieval service a question |
//! | `docsense serve` | Start the HTTP server |
//!
//! Logging goes to stderr and is filtered by `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docsense::models::OwnerId;
use docsense::{cli, config, logging, server};

/// docsense: ingest PDF, text and markdown uploads into chunked, searchable
/// documents.
#[derive(Parser)]
#[command(
    name = "docsense",
    about = "Document ingestion: validated uploads, atomic storage, chunking, and embedding",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsense.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and storage root.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Ingest a local file through the full pipeline.
    Ingest {
        /// File to ingest (`.pdf`, `.txt` or `.md`).
        path: PathBuf,

        /// Owning user id (UUID).
        #[arg(long, default_value_t = OwnerId::DEV)]
        owner: OwnerId,

        /// Declared content type; the file extension decides when omitted.
        #[arg(long)]
        content_type: Option<String>,
    },

    /// List documents owned by a user, newest first.
    Documents {
        /// Owning user id (UUID).
        #[arg(long, default_value_t = OwnerId::DEV)]
        owner: OwnerId,
    },

    /// Print a document by id.
    Get {
        /// Document UUID.
        id: String,
    },

    /// Ask the retrieval service a question.
    Query {
        /// Question text.
        text: String,

        /// Number of matches to retrieve (clamped to `[1, query.max_top_k]`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    logging::init_tracing();

    let cfg = config::load_config(&args.config)?;

    match args.command {
        Commands::Init => {
            cli::run_init(&cfg).await?;
        }
        Commands::Ingest {
            path,
            owner,
            content_type,
        } => {
            cli::run_ingest(&cfg, &path, &owner, content_type).await?;
        }
        Commands::Documents { owner } => {
            cli::run_documents(&cfg, &owner).await?;
        }
        Commands::Get { id } => {
            cli::run_get(&cfg, &id).await?;
        }
        Commands::Query { text, top_k } => {
            cli::run_query(&cfg, &text, top_k).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
