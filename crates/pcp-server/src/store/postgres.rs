//! PostgreSQL record store

use async_trait::async_trait;
use pcp_common::types::ProductRecord;
use sqlx::PgPool;
use uuid::Uuid;

use super::webhook::WebhookNotifier;
use super::{RecordStore, StoreRejection};

/// Record store backed by the `products` table
///
/// Batches are written inside a transaction with a single UNNEST upsert,
/// so a rejected batch leaves nothing behind. Rows are keyed on
/// `(owner_id, lower(sku))`; re-uploading a sku updates name and
/// description in place, matching the pipeline's last-write-wins policy.
pub struct PgRecordStore {
    pool: PgPool,
    hook: Option<WebhookNotifier>,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, hook: None }
    }

    /// Attach a post-commit hook fired after each accepted batch
    pub fn with_post_commit_hook(mut self, hook: WebhookNotifier) -> Self {
        self.hook = Some(hook);
        self
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn bulk_insert(
        &self,
        owner: &str,
        records: &[ProductRecord],
    ) -> Result<(), StoreRejection> {
        if records.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = records.iter().map(|_| Uuid::new_v4()).collect();
        let owners: Vec<String> = records.iter().map(|_| owner.to_string()).collect();
        let names: Vec<String> = records.iter().map(|r| r.name.clone()).collect();
        let skus: Vec<String> = records.iter().map(|r| r.sku.clone()).collect();
        let descriptions: Vec<String> = records.iter().map(|r| r.description.clone()).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreRejection(format!("failed to begin transaction: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO products (id, owner_id, name, sku, description)
            SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[])
            ON CONFLICT (owner_id, (lower(sku)))
            DO UPDATE SET
                name = EXCLUDED.name,
                sku = EXCLUDED.sku,
                description = EXCLUDED.description,
                updated_at = NOW()
            "#,
        )
        .bind(&ids)
        .bind(&owners)
        .bind(&names)
        .bind(&skus)
        .bind(&descriptions)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreRejection(format!("bulk insert rejected: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| StoreRejection(format!("failed to commit batch: {}", e)))?;

        if let Some(ref hook) = self.hook {
            hook.notify_batch(owner, records);
        }

        Ok(())
    }

    async fn exists(&self, owner: &str, key: &str) -> Result<bool, StoreRejection> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM products WHERE owner_id = $1 AND lower(sku) = $2)",
        )
        .bind(owner)
        .bind(key.to_lowercase())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreRejection(format!("exists probe failed: {}", e)))?;

        Ok(exists)
    }
}
