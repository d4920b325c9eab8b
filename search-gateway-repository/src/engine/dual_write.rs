//! Dual-write engine: Meilisearch alongside the legacy engine.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::documents::{id_to_primary_key, DateStyle, DocumentEncoder, FieldSelection};
use crate::engine::ensure_batch;
use crate::errors::SearchError;
use crate::interfaces::{ExternalIndexClient, LegacySearchEngine, SearchEngine};
use crate::meilisearch::{process_results, reconcile_facets};
use crate::types::BatchOperationSummary;
use search_gateway_shared::{
    IndexParams, NormalizedResponse, SearchRequest, SourceRecord, PRIMARY_KEY_FIELD,
};

/// Indexes into Meilisearch and the legacy engine; searches Meilisearch.
///
/// Writes are ordered: Meilisearch first, then the legacy engine. A failed
/// Meilisearch write stops the batch before the legacy engine is called. A
/// failed legacy write after a successful Meilisearch write leaves the two
/// backends divergent; this is logged and the legacy error returned.
pub struct DualWriteEngine {
    external: Arc<dyn ExternalIndexClient>,
    legacy: Arc<dyn LegacySearchEngine>,
    index_name: String,
    index_uid: String,
    facets: Vec<String>,
    encoder: DocumentEncoder,
}

impl DualWriteEngine {
    /// Create an engine for one logical index.
    ///
    /// # Arguments
    ///
    /// * `external` - Meilisearch client
    /// * `legacy` - Legacy engine
    /// * `index_name` - Logical index name, used as-is by the legacy engine
    /// * `index_prefix` - Prepended to `index_name` to form the Meilisearch uid
    /// * `facets` - Filterable attributes declared for this index
    pub fn new(
        external: Arc<dyn ExternalIndexClient>,
        legacy: Arc<dyn LegacySearchEngine>,
        index_name: impl Into<String>,
        index_prefix: &str,
        facets: Vec<String>,
    ) -> Self {
        let index_name = index_name.into();
        Self {
            external,
            legacy,
            index_uid: format!("{}{}", index_prefix, index_name),
            index_name,
            facets,
            encoder: DocumentEncoder::new(DateStyle::Plain),
        }
    }

    /// Restrict which record fields are sent to Meilisearch.
    pub fn with_field_selection(mut self, selection: FieldSelection) -> Self {
        self.encoder = self.encoder.with_selection(selection);
        self
    }

    /// The Meilisearch index uid.
    pub fn index_uid(&self) -> &str {
        &self.index_uid
    }

    /// Encode the batch and attach each record's derived primary key.
    fn external_documents(
        &self,
        records: &[SourceRecord],
    ) -> Result<Vec<serde_json::Map<String, Value>>, SearchError> {
        let mut documents = self.encoder.encode_batch(records)?;
        for (record, document) in records.iter().zip(documents.iter_mut()) {
            document.insert(
                PRIMARY_KEY_FIELD.to_string(),
                Value::String(id_to_primary_key(record.id())),
            );
        }
        Ok(documents)
    }
}

#[async_trait]
impl SearchEngine for DualWriteEngine {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    #[instrument(
        skip(self, records, params),
        fields(index = %self.index_name, record_count = records.len())
    )]
    async fn index(
        &self,
        records: &[SourceRecord],
        params: &IndexParams,
    ) -> Result<BatchOperationSummary, SearchError> {
        ensure_batch(records)?;

        info!(
            index_uid = %self.index_uid,
            request_timeout = ?params.request_timeout,
            "Indexing batch"
        );

        reconcile_facets(self.external.as_ref(), &self.index_uid, &self.facets).await?;

        let documents = self.external_documents(records)?;
        let task = self
            .external
            .add_documents(&self.index_uid, &documents, PRIMARY_KEY_FIELD)
            .await?;
        info!(
            task_uid = task.task_uid,
            status = %task.status,
            "Meilisearch accepted documents"
        );

        let summary = match self.legacy.index(&self.index_name, records, params).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(
                    index = %self.index_name,
                    index_uid = %self.index_uid,
                    meilisearch_task = task.task_uid,
                    error = %e,
                    "Meilisearch and legacy engine are inconsistent: legacy write failed after Meilisearch write"
                );
                return Err(e);
            }
        };

        if !summary.is_complete() {
            warn!(
                index = %self.index_name,
                failed = summary.failed,
                "Legacy engine rejected documents that Meilisearch accepted"
            );
        }
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Legacy engine indexed batch"
        );
        Ok(summary)
    }

    #[instrument(skip(self, request), fields(index = %self.index_name))]
    async fn search(&self, request: &SearchRequest) -> Result<NormalizedResponse, SearchError> {
        if !request.filter_dictionary.is_empty()
            || !request.exclude_dictionary.is_empty()
            || !request.exclude_ids.is_empty()
        {
            debug!(
                filters = ?request.filter_dictionary.keys().collect::<Vec<_>>(),
                excludes = ?request.exclude_dictionary.keys().collect::<Vec<_>>(),
                excluded_ids = request.exclude_ids.len(),
                "Filters are not applied to Meilisearch queries"
            );
        }

        let facets = request.facet_names();
        let query = request.query_string.as_deref().unwrap_or_default();
        let raw = self
            .external
            .search(&self.index_uid, query, &facets)
            .await?;

        debug!(
            hits = raw.hits.len(),
            processing_time_ms = raw.processing_time_ms,
            "Meilisearch search completed"
        );
        process_results(&raw, &self.index_name)
    }
}
