//! PCP Common Library
//!
//! Shared types, utilities, and error handling for the PCP project.
//!
//! # Overview
//!
//! This crate provides common functionality used across all PCP workspace members:
//!
//! - **Error Handling**: The ingestion error taxonomy and result alias
//! - **Logging**: Centralized tracing initialization
//! - **Types**: Shared domain types (`ProductRecord`)
//!
//! # Example
//!
//! ```no_run
//! use pcp_common::{CatalogError, Result};
//! use pcp_common::types::ProductRecord;
//!
//! fn check(record: &ProductRecord) -> Result<()> {
//!     if record.sku.is_empty() {
//!         return Err(CatalogError::MalformedInput("empty sku".to_string()));
//!     }
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CatalogError, Result};
