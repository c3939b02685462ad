//! Feature modules implementing the PCP API
//!
//! Each feature is a vertical slice with its own routes. The only feature
//! today is `uploads`: bulk CSV ingestion plus its SSE progress feed.

pub mod uploads;

use axum::Router;
use std::sync::Arc;

use crate::config::IngestConfig;
use crate::progress::ProgressPublisher;
use crate::store::PgRecordStore;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// PostgreSQL connection pool for database operations
    pub db: sqlx::PgPool,
    /// Durable record store used by the ingestion pipeline
    pub store: Arc<PgRecordStore>,
    /// Progress channel registry shared across upload sessions
    pub publisher: Arc<ProgressPublisher>,
    /// Ingestion pipeline tuning
    pub ingest: IngestConfig,
}

/// Creates the main API router with all feature routes mounted
pub fn router(state: FeatureState) -> Router<()> {
    Router::new().nest("/uploads", uploads::uploads_routes().with_state(state))
}
