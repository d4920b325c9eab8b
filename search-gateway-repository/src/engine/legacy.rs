use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::engine::ensure_batch;
use crate::errors::SearchError;
use crate::interfaces::{LegacySearchEngine, SearchEngine};
use crate::types::BatchOperationSummary;
use search_gateway_shared::{IndexParams, NormalizedResponse, SearchRequest, SourceRecord};

/// Serves an index from the legacy engine only.
pub struct LegacyEngine {
    legacy: Arc<dyn LegacySearchEngine>,
    index_name: String,
}

impl LegacyEngine {
    pub fn new(legacy: Arc<dyn LegacySearchEngine>, index_name: impl Into<String>) -> Self {
        Self {
            legacy,
            index_name: index_name.into(),
        }
    }
}

#[async_trait]
impl SearchEngine for LegacyEngine {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    #[instrument(skip(self, records, params), fields(index = %self.index_name, record_count = records.len()))]
    async fn index(
        &self,
        records: &[SourceRecord],
        params: &IndexParams,
    ) -> Result<BatchOperationSummary, SearchError> {
        ensure_batch(records)?;

        let summary = self.legacy.index(&self.index_name, records, params).await?;
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Legacy index completed"
        );
        Ok(summary)
    }

    async fn search(&self, request: &SearchRequest) -> Result<NormalizedResponse, SearchError> {
        self.legacy.search(&self.index_name, request).await
    }
}
