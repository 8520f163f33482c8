//! # docsense
//!
//! Document ingestion for a retrieval-augmented question answering service.
//!
//! Users upload PDF, plain-text and markdown files. Each upload is validated,
//! written atomically to local storage, hashed, recorded in SQLite, converted
//! to text, split into overlapping word windows, and handed to an external
//! embedding service. Embedding is best effort: a document is `ready` once
//! its content and chunks are persisted, whether or not the service accepted
//! them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ validate │──▶│ storage  │──▶│ checksum │──▶│  store   │
//! └──────────┘   └──────────┘   └──────────┘   └────┬─────┘
//!                                                   ▼
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │   rag    │◀──│  store   │◀──│  chunk   │◀──│ extract  │
//! └──────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! [`ingest::Ingestor`] sequences the steps; [`server`] and the `docsense`
//! binary are its two front ends.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`sanitize`] | Filename and query sanitizing |
//! | [`validate`] | Upload validation |
//! | [`storage`] | Atomic file storage |
//! | [`checksum`] | SHA-256 digests |
//! | [`extract`] | Text extraction |
//! | [`chunk`] | Sliding-window chunking |
//! | [`models`] | Core data types |
//! | [`store`] | Document persistence |
//! | [`rag`] | Embedding/retrieval service client |
//! | [`ingest`] | Ingestion pipeline |
//! | [`server`] | HTTP API |
//! | [`cli`] | CLI commands |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Tracing setup |
//! | [`error`] | Error types |

pub mod checksum;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod rag;
pub mod sanitize;
pub mod server;
pub mod storage;
pub mod store;
pub mod validate;
