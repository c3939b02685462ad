//! Bulk CSV ingestion pipeline
//!
//! An upload flows through four stages: the byte stream is read row by
//! row ([`chunk_reader`]), deduplicated by case-insensitive sku with
//! last-write-wins semantics ([`dedup`]), spilled to a staging CSV
//! ([`spill`]), then bulk-inserted in batches with progress events
//! ([`loader`]). [`run_upload`] drives the whole pipeline for one
//! session; the session owns the staging artifact and removes it on
//! every exit path.

pub mod chunk_reader;
pub mod dedup;
pub mod loader;
pub mod spill;

pub use chunk_reader::ChunkReader;
pub use dedup::Deduplicator;
pub use loader::{BatchLoader, LoadSummary};
pub use spill::{write_staging, StagedArtifact};

use pcp_common::CatalogError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::progress::ProgressPublisher;
use crate::store::RecordStore;

/// Lifecycle of one upload session
///
/// Transitions only move forward; `Failed` is reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Receiving,
    Deduping,
    Staged,
    Loading,
    Completed,
    Failed,
}

impl SessionState {
    fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Receiving, Deduping)
                | (Deduping, Staged)
                | (Staged, Loading)
                | (Loading, Completed)
                | (Receiving | Deduping | Staged | Loading, Failed)
        )
    }
}

/// One in-flight upload
///
/// The session owns its staging path. Dropping the session removes the
/// staging artifact, whether the pipeline completed, failed, or panicked
/// partway through.
#[derive(Debug)]
pub struct UploadSession {
    pub id: Uuid,
    pub owner: String,
    pub filename: String,
    state: SessionState,
    staging_path: PathBuf,
}

impl UploadSession {
    pub fn new(owner: &str, filename: &str, staging_dir: &Path) -> Self {
        let id = Uuid::new_v4();
        let filename = sanitize_filename(filename);
        let staging_path = staging_dir.join(format!("{}-{}-{}.csv", owner, filename, id));
        Self {
            id,
            owner: owner.to_string(),
            filename,
            state: SessionState::Receiving,
            staging_path,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Move to the next lifecycle state
    ///
    /// An illegal transition is a bug in the pipeline driver, surfaced as
    /// an internal error rather than a panic.
    pub fn advance(&mut self, next: SessionState) -> Result<(), CatalogError> {
        if !self.state.can_advance_to(next) {
            return Err(CatalogError::Internal(format!(
                "illegal session transition {:?} -> {:?}",
                self.state, next
            )));
        }
        tracing::debug!(
            session_id = %self.id,
            owner = %self.owner,
            from = ?self.state,
            to = ?next,
            "Session state change"
        );
        self.state = next;
        Ok(())
    }

    fn fail(&mut self) {
        if self.state.can_advance_to(SessionState::Failed) {
            self.state = SessionState::Failed;
        }
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        if self.staging_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.staging_path) {
                tracing::warn!(
                    session_id = %self.id,
                    path = %self.staging_path.display(),
                    error = %e,
                    "Failed to remove staging artifact"
                );
            }
        }
    }
}

/// Final report for a finished upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub session_id: Uuid,
    pub rows_received: u64,
    pub distinct_rows: u64,
    pub rows_inserted: u64,
    pub batches: usize,
    pub staged_bytes: u64,
}

/// Run the full ingestion pipeline for one upload
///
/// Streams `source`, dedups, stages, and loads into `store`, publishing
/// progress on the configured channel. On any error the session moves to
/// `Failed`, an "error" event is published, and the staging artifact is
/// removed.
pub async fn run_upload<R, S>(
    source: R,
    owner: &str,
    filename: &str,
    store: &S,
    publisher: &ProgressPublisher,
    config: &IngestConfig,
    cancel: &CancellationToken,
) -> Result<UploadOutcome, CatalogError>
where
    R: AsyncRead + Unpin + Send,
    S: RecordStore,
{
    let mut session = UploadSession::new(owner, filename, &config.staging_dir);
    tracing::info!(
        session_id = %session.id,
        owner = %owner,
        filename = %session.filename,
        "Upload session started"
    );

    match drive(source, &mut session, store, publisher, config, cancel).await {
        Ok(outcome) => {
            tracing::info!(
                session_id = %session.id,
                owner = %owner,
                rows_inserted = outcome.rows_inserted,
                "Upload session completed"
            );
            Ok(outcome)
        },
        Err(err) => {
            session.fail();
            tracing::error!(
                session_id = %session.id,
                owner = %owner,
                error = %err,
                "Upload session failed"
            );
            publisher.publish(
                &config.progress_channel,
                "error",
                serde_json::json!({
                    "progress": format!("File upload failed: {}", err),
                    "reason_code": err.reason_code(),
                }),
            );
            Err(err)
        },
    }
}

async fn drive<R, S>(
    source: R,
    session: &mut UploadSession,
    store: &S,
    publisher: &ProgressPublisher,
    config: &IngestConfig,
    cancel: &CancellationToken,
) -> Result<UploadOutcome, CatalogError>
where
    R: AsyncRead + Unpin + Send,
    S: RecordStore,
{
    let mut reader = ChunkReader::new(source, config.chunk_size).await?;
    let mut dedup = Deduplicator::new(config.max_distinct_skus);
    let mut rows_received: u64 = 0;

    while let Some(row) = reader.next_row().await? {
        rows_received += 1;
        dedup.observe(row)?;
    }
    session.advance(SessionState::Deduping)?;

    let distinct_rows = dedup.len() as u64;
    let artifact = write_staging(session.staging_path(), dedup.into_rows()).await?;
    session.advance(SessionState::Staged)?;
    tracing::debug!(
        session_id = %session.id,
        rows = artifact.rows,
        bytes = artifact.bytes,
        "Staging artifact written"
    );

    session.advance(SessionState::Loading)?;
    let loader = BatchLoader::new(
        store,
        publisher,
        &config.progress_channel,
        config.batch_size,
        Duration::from_secs(config.batch_timeout_secs),
    );
    let summary = loader
        .load(&session.owner, session.staging_path(), distinct_rows, cancel)
        .await?;
    session.advance(SessionState::Completed)?;

    Ok(UploadOutcome {
        session_id: session.id,
        rows_received,
        distinct_rows,
        rows_inserted: summary.rows_inserted,
        batches: summary.batches,
        staged_bytes: artifact.bytes,
    })
}

/// Keep staging filenames filesystem-safe
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
