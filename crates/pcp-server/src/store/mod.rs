//! Record store collaborator
//!
//! The ingestion core talks to the durable store through the
//! [`RecordStore`] trait: a bulk-insert operation that is atomic per
//! batch (all rows in a batch are accepted or the batch is rejected as a
//! unit) plus a key-existence probe used by the surrounding CRUD surface.
//!
//! The production implementation is [`postgres::PgRecordStore`], which
//! upserts batches inside a transaction and optionally fires a webhook
//! after each commit.

use async_trait::async_trait;
use pcp_common::types::ProductRecord;
use thiserror::Error;

pub mod postgres;
pub mod webhook;

pub use postgres::PgRecordStore;
pub use webhook::WebhookNotifier;

/// A batch rejected by the record store
///
/// Carries the store's reason; the loader translates it into a
/// `CatalogError::BulkInsert` with batch position and committed-row count.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreRejection(pub String);

/// Durable record store reachable through per-batch atomic bulk inserts
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a batch of records for one owner; all-or-nothing per batch
    async fn bulk_insert(
        &self,
        owner: &str,
        records: &[ProductRecord],
    ) -> Result<(), StoreRejection>;

    /// Whether a record with the given lower-cased sku exists for the owner
    async fn exists(&self, owner: &str, key: &str) -> Result<bool, StoreRejection>;
}
