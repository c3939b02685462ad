//! Error types for PCP

use thiserror::Error;

/// Result type alias for PCP operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Main error type for PCP
///
/// The ingestion variants map one-to-one onto the failure modes of the
/// upload pipeline: a bad header or row aborts before any processing,
/// a breached distinct-key ceiling aborts before staging completes, a
/// staging I/O failure aborts with the partial artifact cleaned up, and
/// a rejected batch aborts the load with the already-committed batches
/// left persisted.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Capacity exceeded: {distinct_keys} distinct skus, maximum is {max}")]
    CapacityExceeded { distinct_keys: usize, max: usize },

    #[error("Staging write failed: {0}")]
    StagingWrite(String),

    #[error("Bulk insert rejected at batch {batch_number} after {rows_committed} rows: {reason}")]
    BulkInsert {
        batch_number: usize,
        rows_committed: u64,
        reason: String,
    },

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// Stable reason code reported to API clients
    pub fn reason_code(&self) -> &'static str {
        match self {
            CatalogError::Io(_) => "IO_ERROR",
            CatalogError::Serialization(_) => "SERIALIZATION_ERROR",
            CatalogError::MalformedInput(_) => "MALFORMED_INPUT",
            CatalogError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            CatalogError::StagingWrite(_) => "STAGING_WRITE_FAILED",
            CatalogError::BulkInsert { .. } => "BULK_INSERT_REJECTED",
            CatalogError::Store(_) => "STORE_ERROR",
            CatalogError::Cancelled => "CANCELLED",
            CatalogError::Config(_) => "CONFIG_ERROR",
            CatalogError::Database(_) => "DATABASE_ERROR",
            CatalogError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_insert_display_names_batch_and_committed_rows() {
        let err = CatalogError::BulkInsert {
            batch_number: 2,
            rows_committed: 100,
            reason: "unique constraint".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("batch 2"));
        assert!(msg.contains("100 rows"));
    }

    #[test]
    fn test_reason_codes_are_stable() {
        assert_eq!(
            CatalogError::MalformedInput("x".into()).reason_code(),
            "MALFORMED_INPUT"
        );
        assert_eq!(
            CatalogError::CapacityExceeded {
                distinct_keys: 9,
                max: 8
            }
            .reason_code(),
            "CAPACITY_EXCEEDED"
        );
        assert_eq!(CatalogError::Cancelled.reason_code(), "CANCELLED");
    }
}
