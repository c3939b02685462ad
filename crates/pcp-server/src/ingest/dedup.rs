//! Case-insensitive, last-write-wins deduplication
//!
//! Rows are keyed by lower-cased sku in a single ordered map: membership
//! test and overwrite are O(1) amortized, memory is O(distinct keys), and
//! iteration yields rows in first-seen key order. A later duplicate
//! replaces the stored row in place without moving its position, so the
//! staged output order is stable regardless of where duplicates appear.

use indexmap::IndexMap;
use pcp_common::types::ProductRecord;
use pcp_common::CatalogError;

/// Working set of deduplicated rows for one upload session
#[derive(Debug)]
pub struct Deduplicator {
    rows: IndexMap<String, ProductRecord>,
    max_distinct: usize,
}

impl Deduplicator {
    pub fn new(max_distinct: usize) -> Self {
        Self {
            rows: IndexMap::new(),
            max_distinct,
        }
    }

    /// Feed one row, in arrival order
    ///
    /// An unseen key is recorded; a seen key has its stored row replaced
    /// (last-write-wins, never a merge). Fails with `CapacityExceeded`
    /// when a new key would push the distinct count past the ceiling.
    pub fn observe(&mut self, row: ProductRecord) -> Result<(), CatalogError> {
        let key = row.key();
        if let Some(existing) = self.rows.get_mut(&key) {
            *existing = row;
            return Ok(());
        }

        if self.rows.len() >= self.max_distinct {
            return Err(CatalogError::CapacityExceeded {
                distinct_keys: self.rows.len() + 1,
                max: self.max_distinct,
            });
        }

        self.rows.insert(key, row);
        Ok(())
    }

    /// Number of distinct keys seen so far
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Consume the set, yielding final rows in first-seen key order
    pub fn into_rows(self) -> impl Iterator<Item = ProductRecord> {
        self.rows.into_values()
    }
}
