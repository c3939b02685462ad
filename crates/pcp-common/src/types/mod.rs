//! Common types used across PCP

use serde::{Deserialize, Serialize};

/// Canonical CSV field order for product uploads and staging artifacts.
pub const PRODUCT_FIELDS: [&str; 3] = ["name", "sku", "description"];

/// A single product record as carried through the ingestion pipeline.
///
/// Identity within an upload is the lower-cased sku; two rows whose skus
/// differ only in case are the same product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub sku: String,
    pub description: String,
}

impl ProductRecord {
    pub fn new(
        name: impl Into<String>,
        sku: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            sku: sku.into(),
            description: description.into(),
        }
    }

    /// Deduplication key: the lower-cased sku.
    pub fn key(&self) -> String {
        self.sku.to_lowercase()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_case_insensitive() {
        let a = ProductRecord::new("Widget", "ABC-123", "first");
        let b = ProductRecord::new("Widget", "abc-123", "second");
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), "abc-123");
    }
}
