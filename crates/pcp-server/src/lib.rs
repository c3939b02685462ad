//! PCP Server Library
//!
//! HTTP server for bulk product-catalog ingestion.
//!
//! # Overview
//!
//! The PCP server accepts CSV uploads of product records and loads them
//! into a durable record store:
//!
//! - **Streaming ingest**: uploads are consumed chunk by chunk, never
//!   materializing the file in memory
//! - **Deduplication**: case-insensitive sku identity, last-write-wins
//! - **Staging**: the deduplicated set is spilled to a bounded staging
//!   artifact before loading
//! - **Batch loading**: fixed-size batches, atomic per batch, with
//!   progress events published after every accepted batch
//! - **Progress channel**: best-effort broadcast consumed over SSE
//!
//! # Architecture
//!
//! One sequential pipeline per upload session: reader → dedup → spill →
//! load. Concurrent sessions share only the record store and the progress
//! channel registry, both safe under concurrent use.
//!
//! ## Framework Stack
//!
//! - **Axum**: HTTP routes for uploads and progress subscription
//! - **SQLx**: PostgreSQL record store with transactional batch upserts
//! - **Tower**: CORS, compression, and request tracing middleware

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;
pub mod progress;
pub mod store;

// Re-export commonly used types
pub use error::{AppError, ApiResult};
