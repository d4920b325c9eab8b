//! OpenSearch implementation of the legacy engine.
//!
//! This module provides the concrete implementation of `LegacySearchEngine`
//! against an Elasticsearch-compatible cluster using the OpenSearch Rust
//! client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    BulkParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::documents::{DateStyle, DocumentEncoder};
use crate::errors::{Backend, SearchError};
use crate::interfaces::LegacySearchEngine;
use crate::opensearch::queries::build_search_query;
use crate::types::{BatchOperationResult, BatchOperationSummary};
use search_gateway_shared::{
    Aggregation, IndexParams, NormalizedHit, NormalizedResponse, SearchRequest, SourceRecord,
    DOCUMENT_TYPE,
};

/// Legacy engine backed by OpenSearch.
///
/// Documents are keyed by the record's `id` and dates are sent as ISO-8601.
///
/// # Example
///
/// ```ignore
/// let engine = OpenSearchLegacyEngine::new("http://localhost:9200")?;
/// let summary = engine.index("course_info", &records, &IndexParams::default()).await?;
/// ```
pub struct OpenSearchLegacyEngine {
    client: OpenSearch,
    encoder: DocumentEncoder,
}

impl OpenSearchLegacyEngine {
    /// Create a new engine connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The cluster URL (e.g., "http://localhost:9200")
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchLegacyEngine)` - A new engine instance
    /// * `Err(SearchError)` - If the URL is invalid or the transport cannot be built
    pub fn new(url: &str) -> Result<Self, SearchError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchError::connection(Backend::OpenSearch, e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchError::connection(Backend::OpenSearch, e.to_string()))?;

        info!(url = %url, "Created OpenSearch client");

        Ok(Self {
            client: OpenSearch::new(transport),
            encoder: DocumentEncoder::new(DateStyle::Iso8601),
        })
    }

    /// Build the newline-delimited bulk body: an action line then the document.
    fn bulk_body(&self, records: &[SourceRecord]) -> Result<Vec<JsonBody<Value>>, SearchError> {
        let documents = self.encoder.encode_batch(records)?;

        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
        for (record, document) in records.iter().zip(documents) {
            body.push(json!({"index": {"_id": record.id()}}).into());
            body.push(Value::Object(document).into());
        }
        Ok(body)
    }

    /// Turn the `items` of a bulk response into per-document results.
    ///
    /// Items are matched to records by position; the item's own `_id` wins
    /// when present.
    fn parse_bulk_response(body: &Value, records: &[SourceRecord]) -> BatchOperationSummary {
        let empty = Vec::new();
        let items = body
            .get("items")
            .and_then(Value::as_array)
            .unwrap_or(&empty);

        let results = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let item = items.get(i).and_then(|item| item.get("index"));
                let document_id = item
                    .and_then(|item| item.get("_id"))
                    .and_then(Value::as_str)
                    .unwrap_or(record.id())
                    .to_string();

                let error = match item {
                    None => Some("missing from bulk response".to_string()),
                    Some(item) => item.get("error").map(|e| {
                        e.get("reason")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| e.to_string())
                    }),
                };

                BatchOperationResult {
                    document_id,
                    success: error.is_none(),
                    error,
                }
            })
            .collect();

        BatchOperationSummary::from_results(results)
    }

    /// Convert a search response into the legacy envelope.
    fn parse_search_response(
        body: &Value,
        index_name: &str,
    ) -> Result<NormalizedResponse, SearchError> {
        let hits = body
            .get("hits")
            .ok_or_else(|| SearchError::parse("search response has no hits"))?;

        // `hits.total` is an object on 7.x and later, a bare number before.
        let total = hits
            .get("total")
            .and_then(|t| t.get("value").and_then(Value::as_u64).or_else(|| t.as_u64()))
            .ok_or_else(|| SearchError::parse("search response has no hits.total"))?;

        let results = match hits.get("hits").and_then(Value::as_array) {
            Some(hits) => hits
                .iter()
                .map(|hit| Self::parse_hit(hit, index_name))
                .collect::<Result<Vec<_>, SearchError>>()?,
            None => Vec::new(),
        };

        let mut aggs = BTreeMap::new();
        if let Some(aggregations) = body.get("aggregations").and_then(Value::as_object) {
            for (name, aggregation) in aggregations {
                aggs.insert(name.clone(), Self::parse_aggregation(aggregation));
            }
        }

        Ok(NormalizedResponse {
            took: body.get("took").and_then(Value::as_u64).unwrap_or(0),
            total,
            max_score: hits.get("max_score").and_then(Value::as_f64).unwrap_or(0.0),
            results,
            aggs,
        })
    }

    fn parse_hit(hit: &Value, index_name: &str) -> Result<NormalizedHit, SearchError> {
        let id = hit
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| SearchError::parse("search hit has no _id"))?;

        Ok(NormalizedHit {
            id: id.to_string(),
            index: hit
                .get("_index")
                .and_then(Value::as_str)
                .unwrap_or(index_name)
                .to_string(),
            doc_type: DOCUMENT_TYPE.to_string(),
            data: hit
                .get("_source")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            score: hit.get("_score").and_then(Value::as_f64),
        })
    }

    fn parse_aggregation(aggregation: &Value) -> Aggregation {
        let mut terms = BTreeMap::new();
        if let Some(buckets) = aggregation.get("buckets").and_then(Value::as_array) {
            for bucket in buckets {
                let key = match bucket.get("key_as_string").or_else(|| bucket.get("key")) {
                    Some(Value::String(key)) => key.clone(),
                    Some(other) => other.to_string(),
                    None => continue,
                };
                let count = bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0);
                terms.insert(key, count);
            }
        }

        Aggregation {
            total: terms.values().sum::<u64>() as f64,
            other: aggregation
                .get("sum_other_doc_count")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            terms,
        }
    }
}

#[async_trait]
impl LegacySearchEngine for OpenSearchLegacyEngine {
    /// Bulk index records with their `id` as the document id.
    ///
    /// A request that fails as a whole is an error; per-document failures
    /// are reported in the summary.
    #[instrument(skip(self, records, params), fields(record_count = records.len()))]
    async fn index(
        &self,
        index_name: &str,
        records: &[SourceRecord],
        params: &IndexParams,
    ) -> Result<BatchOperationSummary, SearchError> {
        if records.is_empty() {
            return Ok(BatchOperationSummary::from_results(Vec::new()));
        }

        let body = self.bulk_body(records)?;

        let mut request = self.client.bulk(BulkParts::Index(index_name)).body(body);
        if let Some(timeout) = params.request_timeout {
            request = request.request_timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::upstream_write(Backend::OpenSearch, e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchError::upstream_write(
                Backend::OpenSearch,
                format!("Bulk failed with status {}: {}", status, error_body),
            ));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        let summary = Self::parse_bulk_response(&response_body, records);
        debug!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk index completed"
        );
        Ok(summary)
    }

    #[instrument(skip(self, request))]
    async fn search(
        &self,
        index_name: &str,
        request: &SearchRequest,
    ) -> Result<NormalizedResponse, SearchError> {
        let query = build_search_query(request);
        debug!(query = %query, "Legacy search query");

        let indexes = [index_name];
        let mut search = self.client.search(SearchParts::Index(&indexes)).body(query);
        if let Some(from) = request.from {
            search = search.from(from as i64);
        }
        if let Some(size) = request.size {
            search = search.size(size as i64);
        }

        let response = search
            .send()
            .await
            .map_err(|e| SearchError::query(Backend::OpenSearch, e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Search request failed");
            return Err(SearchError::query(
                Backend::OpenSearch,
                format!("Search failed with status {}: {}", status, error_body),
            ));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        Self::parse_search_response(&response_body, index_name)
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchError::connection(Backend::OpenSearch, e.to_string()))?;

        let health: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;
        let status = health
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        debug!(status = %status, "OpenSearch cluster status");
        Ok(status == "green" || status == "yellow")
    }
}
