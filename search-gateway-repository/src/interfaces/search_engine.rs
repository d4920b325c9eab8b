//! Per-index search engine trait definition.

use async_trait::async_trait;

use crate::errors::SearchError;
use crate::types::BatchOperationSummary;
use search_gateway_shared::{IndexParams, NormalizedResponse, SearchRequest, SourceRecord};

/// A search engine bound to one logical index.
///
/// Implementations are selected once at startup from configuration; callers
/// only see this trait.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// The logical index this engine serves.
    fn index_name(&self) -> &str;

    /// Index a non-empty batch of records.
    async fn index(
        &self,
        records: &[SourceRecord],
        params: &IndexParams,
    ) -> Result<BatchOperationSummary, SearchError>;

    /// Search the index and return the legacy response envelope.
    async fn search(&self, request: &SearchRequest) -> Result<NormalizedResponse, SearchError>;
}
