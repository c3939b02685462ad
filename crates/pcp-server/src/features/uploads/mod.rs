//! Bulk upload feature
//!
//! CSV ingestion endpoint plus the SSE progress feed clients watch while
//! an upload loads.

pub mod routes;

pub use routes::uploads_routes;
