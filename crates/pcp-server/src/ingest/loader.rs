//! Batch loader
//!
//! Reads the staging artifact back in fixed-size batches and bulk-inserts
//! each batch into the record store. After every accepted batch a progress
//! event is published with the cumulative fraction of rows inserted; a
//! terminal "complete" event follows once the artifact is exhausted.
//!
//! A cancellation check runs between batches, so a long load can be
//! aborted with only fully-accepted batches left committed. Each
//! bulk-insert is wrapped in a timeout; expiry is treated the same as a
//! store rejection.

use pcp_common::types::ProductRecord;
use pcp_common::CatalogError;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::chunk_reader::ChunkReader;
use crate::progress::ProgressPublisher;
use crate::store::RecordStore;

/// Result of a completed load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_inserted: u64,
    pub batches: usize,
}

/// Loads a staging artifact into the record store, batch by batch
pub struct BatchLoader<'a, S: RecordStore> {
    store: &'a S,
    publisher: &'a ProgressPublisher,
    channel: &'a str,
    batch_size: usize,
    batch_timeout: Duration,
}

impl<'a, S: RecordStore> BatchLoader<'a, S> {
    pub fn new(
        store: &'a S,
        publisher: &'a ProgressPublisher,
        channel: &'a str,
        batch_size: usize,
        batch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            publisher,
            channel,
            batch_size,
            batch_timeout,
        }
    }

    /// Load the staged artifact for one owner
    ///
    /// `total_rows` is the artifact's row count (the distinct-key count),
    /// used as the progress denominator.
    pub async fn load(
        &self,
        owner: &str,
        staged: &Path,
        total_rows: u64,
        cancel: &CancellationToken,
    ) -> Result<LoadSummary, CatalogError> {
        let file = tokio::fs::File::open(staged).await?;
        let mut reader = ChunkReader::new(file, self.batch_size * 256).await?;

        let mut rows_inserted: u64 = 0;
        let mut batch_number = 0usize;

        loop {
            let batch = self.next_batch(&mut reader).await?;
            if batch.is_empty() {
                break;
            }
            batch_number += 1;

            if cancel.is_cancelled() {
                tracing::warn!(
                    owner = %owner,
                    batch_number,
                    rows_inserted,
                    "Load cancelled between batches"
                );
                return Err(CatalogError::Cancelled);
            }

            self.insert_batch(owner, &batch, batch_number, rows_inserted)
                .await?;
            rows_inserted += batch.len() as u64;

            self.publish_progress(rows_inserted, total_rows);
        }

        self.publish_complete(rows_inserted, total_rows);

        tracing::info!(
            owner = %owner,
            rows_inserted,
            batches = batch_number,
            "Load complete"
        );

        Ok(LoadSummary {
            rows_inserted,
            batches: batch_number,
        })
    }

    async fn next_batch<R>(
        &self,
        reader: &mut ChunkReader<R>,
    ) -> Result<Vec<ProductRecord>, CatalogError>
    where
        R: tokio::io::AsyncRead + Unpin + Send,
    {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match reader.next_row().await? {
                Some(row) => batch.push(row),
                None => break,
            }
        }
        Ok(batch)
    }

    async fn insert_batch(
        &self,
        owner: &str,
        batch: &[ProductRecord],
        batch_number: usize,
        rows_committed: u64,
    ) -> Result<(), CatalogError> {
        let insert = self.store.bulk_insert(owner, batch);
        match tokio::time::timeout(self.batch_timeout, insert).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(rejection)) => Err(CatalogError::BulkInsert {
                batch_number,
                rows_committed,
                reason: rejection.to_string(),
            }),
            Err(_) => Err(CatalogError::BulkInsert {
                batch_number,
                rows_committed,
                reason: format!("timed out after {:?}", self.batch_timeout),
            }),
        }
    }

    fn publish_progress(&self, rows_inserted: u64, total_rows: u64) {
        let percent = percent_complete(rows_inserted, total_rows);
        self.publisher.publish(
            self.channel,
            "message",
            json!({
                "progress": format!("File upload is {:.1}% complete", percent),
                "percent": percent,
                "rows_inserted": rows_inserted,
                "total_rows": total_rows,
            }),
        );
    }

    fn publish_complete(&self, rows_inserted: u64, total_rows: u64) {
        self.publisher.publish(
            self.channel,
            "complete",
            json!({
                "progress": "File upload complete",
                "percent": 100.0,
                "rows_inserted": rows_inserted,
                "total_rows": total_rows,
            }),
        );
    }
}

/// Cumulative progress percentage: rows inserted over total distinct rows
fn percent_complete(rows_inserted: u64, total_rows: u64) -> f64 {
    if total_rows == 0 {
        return 100.0;
    }
    (rows_inserted as f64 / total_rows as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::spill::write_staging;
    use crate::store::StoreRejection;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store that can be told to reject a specific batch
    #[derive(Default)]
    struct TestStore {
        reject_batch: Option<usize>,
        calls: AtomicUsize,
        inserted: Mutex<Vec<ProductRecord>>,
    }

    impl TestStore {
        fn rejecting(batch: usize) -> Self {
            Self {
                reject_batch: Some(batch),
                ..Default::default()
            }
        }

        fn inserted_rows(&self) -> Vec<ProductRecord> {
            self.inserted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordStore for TestStore {
        async fn bulk_insert(
            &self,
            _owner: &str,
            records: &[ProductRecord],
        ) -> Result<(), StoreRejection> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.reject_batch == Some(call) {
                return Err(StoreRejection("batch rejected by test store".into()));
            }
            self.inserted.lock().unwrap().extend_from_slice(records);
            Ok(())
        }

        async fn exists(&self, _owner: &str, key: &str) -> Result<bool, StoreRejection> {
            Ok(self
                .inserted
                .lock()
                .unwrap()
                .iter()
                .any(|r| r.key() == key))
        }
    }

    fn rows(n: usize) -> Vec<ProductRecord> {
        (0..n)
            .map(|i| ProductRecord::new(format!("P{}", i), format!("sku{}", i), "d"))
            .collect()
    }

    async fn stage(dir: &tempfile::TempDir, records: Vec<ProductRecord>) -> std::path::PathBuf {
        let path = dir.path().join("staged.csv");
        write_staging(&path, records.into_iter()).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_loads_all_batches_and_reports_completion() {
        let dir = tempfile::tempdir().unwrap();
        let path = stage(&dir, rows(5)).await;

        let store = TestStore::default();
        let publisher = ProgressPublisher::new();
        let mut rx = publisher.subscribe("uploadprogress");

        let loader = BatchLoader::new(
            &store,
            &publisher,
            "uploadprogress",
            2,
            Duration::from_secs(5),
        );
        let summary = loader
            .load("alice", &path, 5, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            summary,
            LoadSummary {
                rows_inserted: 5,
                batches: 3
            }
        );
        assert_eq!(store.inserted_rows().len(), 5);

        // Progress is monotonically non-decreasing and ends in a complete event
        let mut last_percent = 0.0;
        let mut saw_complete = false;
        while let Ok(event) = rx.try_recv() {
            let percent = event.payload["percent"].as_f64().unwrap();
            assert!(percent >= last_percent);
            last_percent = percent;
            if event.event_type == "complete" {
                saw_complete = true;
            }
        }
        assert!(saw_complete);
        assert_eq!(last_percent, 100.0);
    }

    #[tokio::test]
    async fn test_rejected_batch_stops_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = stage(&dir, rows(6)).await;

        let store = TestStore::rejecting(2);
        let publisher = ProgressPublisher::new();
        let loader = BatchLoader::new(
            &store,
            &publisher,
            "uploadprogress",
            2,
            Duration::from_secs(5),
        );

        let err = loader
            .load("alice", &path, 6, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            CatalogError::BulkInsert {
                batch_number,
                rows_committed,
                ..
            } => {
                assert_eq!(batch_number, 2);
                assert_eq!(rows_committed, 2);
            },
            other => panic!("expected BulkInsert, got {:?}", other),
        }

        // Batch 1 remains committed, batch 3 was never attempted
        assert_eq!(store.inserted_rows().len(), 2);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_artifact_completes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = stage(&dir, Vec::new()).await;

        let store = TestStore::default();
        let publisher = ProgressPublisher::new();
        let mut rx = publisher.subscribe("uploadprogress");

        let loader = BatchLoader::new(
            &store,
            &publisher,
            "uploadprogress",
            100,
            Duration::from_secs(5),
        );
        let summary = loader
            .load("alice", &path, 0, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            summary,
            LoadSummary {
                rows_inserted: 0,
                batches: 0
            }
        );
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type, "complete");
        assert_eq!(event.payload["percent"], 100.0);
    }

    #[tokio::test]
    async fn test_cancellation_between_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = stage(&dir, rows(4)).await;

        let store = TestStore::default();
        let publisher = ProgressPublisher::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let loader = BatchLoader::new(
            &store,
            &publisher,
            "uploadprogress",
            2,
            Duration::from_secs(5),
        );
        let err = loader.load("alice", &path, 4, &cancel).await.unwrap_err();

        assert!(matches!(err, CatalogError::Cancelled));
        // Cancelled before the first batch, nothing committed
        assert!(store.inserted_rows().is_empty());
    }

    #[test]
    fn test_percent_complete_formula() {
        assert_eq!(percent_complete(0, 0), 100.0);
        assert_eq!(percent_complete(50, 200), 25.0);
        assert_eq!(percent_complete(200, 200), 100.0);
    }
}
