//! Legacy search engine trait definition.

use async_trait::async_trait;

use crate::errors::SearchError;
use crate::types::BatchOperationSummary;
use search_gateway_shared::{IndexParams, NormalizedResponse, SearchRequest, SourceRecord};

/// Abstract interface for the legacy Elasticsearch-compatible engine.
///
/// Index arguments are logical index names.
#[async_trait]
pub trait LegacySearchEngine: Send + Sync {
    /// Index records, keyed by their `id`.
    ///
    /// # Arguments
    ///
    /// * `index_name` - Logical index name
    /// * `records` - Records exactly as supplied by the caller
    /// * `params` - Engine parameters, forwarded verbatim
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-document outcome
    /// * `Err(SearchError::UpstreamWriteError)` - If the request fails as a whole
    async fn index(
        &self,
        index_name: &str,
        records: &[SourceRecord],
        params: &IndexParams,
    ) -> Result<BatchOperationSummary, SearchError>;

    /// Execute a search and return the legacy response envelope.
    async fn search(
        &self,
        index_name: &str,
        request: &SearchRequest,
    ) -> Result<NormalizedResponse, SearchError>;

    /// Check if the engine is healthy and reachable.
    async fn health_check(&self) -> Result<bool, SearchError>;
}
