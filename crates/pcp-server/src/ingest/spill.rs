//! Staging artifact writer
//!
//! Spills the deduplicated row set to a CSV staging file so the batch
//! loader operates on a bounded, known-size input instead of re-streaming
//! the original upload. Rows are written in the order the deduplicator
//! produced them, under the canonical three-field header.

use csv_async::AsyncWriterBuilder;
use pcp_common::types::{ProductRecord, PRODUCT_FIELDS};
use pcp_common::CatalogError;
use std::path::{Path, PathBuf};

/// A completed staging artifact
#[derive(Debug)]
pub struct StagedArtifact {
    pub path: PathBuf,
    pub bytes: u64,
    pub rows: usize,
}

/// Write the deduplicated rows to `path`
///
/// Any I/O failure maps to `StagingWrite`; the caller's session owns the
/// path and removes whatever partial artifact exists on every exit path.
pub async fn write_staging(
    path: &Path,
    rows: impl Iterator<Item = ProductRecord>,
) -> Result<StagedArtifact, CatalogError> {
    let staging_err = |e: &dyn std::fmt::Display| CatalogError::StagingWrite(e.to_string());

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| staging_err(&e))?;
    }

    let file = tokio::fs::File::create(path)
        .await
        .map_err(|e| staging_err(&e))?;
    let mut writer = AsyncWriterBuilder::new().create_writer(file);

    writer
        .write_record(&PRODUCT_FIELDS)
        .await
        .map_err(|e| staging_err(&e))?;

    let mut count = 0usize;
    for row in rows {
        writer
            .write_record(&[row.name, row.sku, row.description])
            .await
            .map_err(|e| staging_err(&e))?;
        count += 1;
    }

    writer.flush().await.map_err(|e| staging_err(&e))?;
    drop(writer);

    let bytes = tokio::fs::metadata(path)
        .await
        .map_err(|e| staging_err(&e))?
        .len();

    Ok(StagedArtifact {
        path: path.to_path_buf(),
        bytes,
        rows: count,
    })
}
