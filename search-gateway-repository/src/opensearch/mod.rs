//! OpenSearch implementation of the legacy search engine.
//!
//! This module provides a concrete implementation of `LegacySearchEngine`
//! using OpenSearch as the backend.

mod client;
mod queries;

pub use client::OpenSearchLegacyEngine;
pub use queries::{build_search_query, escape_query_string, AGGREGATION_BUCKET_LIMIT};
