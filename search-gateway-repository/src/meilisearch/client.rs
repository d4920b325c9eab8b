//! Meilisearch client implementation.
//!
//! This module provides the concrete implementation of `ExternalIndexClient`
//! using the Meilisearch Rust SDK.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meilisearch_sdk::{
    client::Client,
    errors::{Error as MeilisearchSdkError, ErrorCode},
    indexes::IndexesQuery,
    key::{Action, KeyBuilder},
    search::{SearchResults, Selectors},
    settings::Settings,
    task_info::TaskInfo,
};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use crate::errors::{Backend, SearchError};
use crate::interfaces::ExternalIndexClient;
use crate::meilisearch::tokens::TenantTokenSigner;
use crate::types::{ApiKey, ApiKeyRequest, IndexSettings, TaskReceipt};
use search_gateway_shared::{RawHit, RawSearchResponse};

/// Page size used when listing indexes.
const INDEX_PAGE_SIZE: usize = 100;

/// Meilisearch client implementation.
///
/// # Example
///
/// ```ignore
/// let client = MeilisearchClient::new("http://meilisearch:7700", "master-key")?;
/// let raw = client.search("openedx_course_info", "demo", &["org".to_string()]).await?;
/// ```
pub struct MeilisearchClient {
    client: Client,
}

impl MeilisearchClient {
    /// Create a new client for the given Meilisearch URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The Meilisearch server URL (e.g., "http://localhost:7700")
    /// * `api_key` - Master or admin key used for writes and settings
    ///
    /// # Returns
    ///
    /// * `Ok(MeilisearchClient)` - A new client instance
    /// * `Err(SearchError)` - If the client cannot be built
    pub fn new(url: &str, api_key: &str) -> Result<Self, SearchError> {
        let client = Client::new(url, Some(api_key))
            .map_err(|e| SearchError::connection(Backend::Meilisearch, e.to_string()))?;

        info!(url = %url, "Created Meilisearch client");

        Ok(Self { client })
    }
}

impl From<TaskInfo> for TaskReceipt {
    fn from(task: TaskInfo) -> Self {
        Self {
            task_uid: task.task_uid,
            index_uid: task.index_uid,
            status: task.status,
        }
    }
}

fn into_raw_response(results: SearchResults<Map<String, Value>>) -> RawSearchResponse {
    RawSearchResponse {
        hits: results
            .hits
            .into_iter()
            .map(|hit| RawHit {
                ranking_score: hit.ranking_score,
                fields: hit.result,
            })
            .collect(),
        query: results.query,
        processing_time_ms: results.processing_time_ms as u64,
        estimated_total_hits: results.estimated_total_hits.map(|n| n as u64),
        total_hits: results.total_hits.map(|n| n as u64),
        facet_distribution: results.facet_distribution.map(|distribution| {
            distribution
                .into_iter()
                .map(|(facet, values)| {
                    let values = values
                        .into_iter()
                        .map(|(value, count)| (value, count as u64))
                        .collect();
                    (facet, values)
                })
                .collect()
        }),
    }
}

fn to_sdk_settings(settings: &IndexSettings) -> Settings {
    Settings {
        searchable_attributes: settings.searchable_attributes.clone(),
        displayed_attributes: settings.displayed_attributes.clone(),
        filterable_attributes: settings.filterable_attributes.clone(),
        sortable_attributes: settings.sortable_attributes.clone(),
        ranking_rules: settings.ranking_rules.clone(),
        stop_words: settings.stop_words.clone(),
        ..Settings::default()
    }
}

/// Map action names (`search`, `documents.add`, `*`, ...) to SDK actions.
fn parse_actions(actions: &[String]) -> Result<Vec<Action>, SearchError> {
    actions
        .iter()
        .map(|action| {
            serde_json::from_value(Value::String(action.clone()))
                .map_err(|_| SearchError::validation(format!("unknown key action: {}", action)))
        })
        .collect()
}

fn to_offset_datetime(value: DateTime<Utc>) -> Result<OffsetDateTime, SearchError> {
    OffsetDateTime::from_unix_timestamp(value.timestamp())
        .map_err(|e| SearchError::validation(format!("invalid expiry {}: {}", value, e)))
}

fn from_offset_datetime(value: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.unix_timestamp(), value.nanosecond())
}

fn is_index_not_found(err: &MeilisearchSdkError) -> bool {
    matches!(err, MeilisearchSdkError::Meilisearch(e) if e.error_code == ErrorCode::IndexNotFound)
}

#[async_trait]
impl ExternalIndexClient for MeilisearchClient {
    #[instrument(skip(self, documents), fields(document_count = documents.len()))]
    async fn add_documents(
        &self,
        index_uid: &str,
        documents: &[Map<String, Value>],
        primary_key: &str,
    ) -> Result<TaskReceipt, SearchError> {
        let task = self
            .client
            .index(index_uid)
            .add_documents(documents, Some(primary_key))
            .await
            .map_err(|e| SearchError::upstream_write(Backend::Meilisearch, e.to_string()))?;

        debug!(task_uid = task.task_uid, "Documents enqueued");
        Ok(task.into())
    }

    async fn get_filterable_attributes(&self, index_uid: &str) -> Result<Vec<String>, SearchError> {
        match self.client.index(index_uid).get_filterable_attributes().await {
            Ok(attributes) => Ok(attributes),
            // The index is created by the first write.
            Err(e) if is_index_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(SearchError::query(Backend::Meilisearch, e.to_string())),
        }
    }

    async fn set_filterable_attributes(
        &self,
        index_uid: &str,
        attributes: &[String],
    ) -> Result<TaskReceipt, SearchError> {
        let task = self
            .client
            .index(index_uid)
            .set_filterable_attributes(attributes)
            .await
            .map_err(|e| SearchError::upstream_write(Backend::Meilisearch, e.to_string()))?;

        info!(index_uid = %index_uid, attributes = ?attributes, "Filterable attributes updated");
        Ok(task.into())
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        index_uid: &str,
        query: &str,
        facets: &[String],
    ) -> Result<RawSearchResponse, SearchError> {
        let index = self.client.index(index_uid);
        let facet_refs: Vec<&str> = facets.iter().map(String::as_str).collect();

        let mut search = index.search();
        search.with_query(query).with_show_ranking_score(true);
        if !facet_refs.is_empty() {
            search.with_facets(Selectors::Some(facet_refs.as_slice()));
        }

        let results = search
            .execute::<Map<String, Value>>()
            .await
            .map_err(|e| SearchError::query(Backend::Meilisearch, e.to_string()))?;

        Ok(into_raw_response(results))
    }

    async fn ensure_index(
        &self,
        index_uid: &str,
        primary_key: &str,
        settings: &IndexSettings,
    ) -> Result<(), SearchError> {
        match self.client.get_index(index_uid).await {
            Ok(_) => debug!(index_uid = %index_uid, "Index already exists"),
            Err(e) if is_index_not_found(&e) => {
                let task = self
                    .client
                    .create_index(index_uid, Some(primary_key))
                    .await
                    .map_err(|e| SearchError::index_creation(e.to_string()))?
                    .wait_for_completion(&self.client, None, None)
                    .await
                    .map_err(|e| SearchError::index_creation(e.to_string()))?;

                if task.is_failure() {
                    return Err(SearchError::index_creation(format!(
                        "creating {} failed: {:?}",
                        index_uid, task
                    )));
                }
                info!(index_uid = %index_uid, primary_key = %primary_key, "Created index");
            }
            Err(e) => return Err(SearchError::connection(Backend::Meilisearch, e.to_string())),
        }

        if settings.is_empty() {
            return Ok(());
        }

        let task = self
            .client
            .index(index_uid)
            .set_settings(&to_sdk_settings(settings))
            .await
            .map_err(|e| SearchError::upstream_write(Backend::Meilisearch, e.to_string()))?;
        info!(index_uid = %index_uid, task_uid = task.task_uid, "Index settings updated");
        Ok(())
    }

    async fn list_indexes(&self) -> Result<Vec<String>, SearchError> {
        let mut uids = Vec::new();
        let mut offset = 0;
        loop {
            let mut query = IndexesQuery::new(&self.client);
            query.with_offset(offset).with_limit(INDEX_PAGE_SIZE);
            let page = query
                .execute()
                .await
                .map_err(|e| SearchError::query(Backend::Meilisearch, e.to_string()))?;

            let count = page.results.len();
            uids.extend(page.results.into_iter().map(|index| index.uid));
            if count < INDEX_PAGE_SIZE {
                break;
            }
            offset += count;
        }
        Ok(uids)
    }

    async fn create_key(&self, request: &ApiKeyRequest) -> Result<ApiKey, SearchError> {
        let mut builder = KeyBuilder::new();
        builder
            .with_actions(parse_actions(&request.actions)?)
            .with_indexes(&request.indexes)
            .with_description(&request.description);
        if let Some(expires_at) = request.expires_at {
            builder.with_expires_at(to_offset_datetime(expires_at)?);
        }

        let key = self
            .client
            .create_key(builder)
            .await
            .map_err(|e| SearchError::upstream_write(Backend::Meilisearch, e.to_string()))?;

        info!(uid = %key.uid, indexes = ?key.indexes, "Created API key");
        Ok(ApiKey {
            key: key.key,
            uid: key.uid,
            indexes: key.indexes,
            expires_at: key.expires_at.and_then(from_offset_datetime),
        })
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let health = self
            .client
            .health()
            .await
            .map_err(|e| SearchError::connection(Backend::Meilisearch, e.to_string()))?;

        Ok(health.status == "available")
    }
}

#[async_trait]
impl TenantTokenSigner for MeilisearchClient {
    async fn api_key_uid(&self, api_key: &str) -> Result<String, SearchError> {
        let key = self
            .client
            .get_key(api_key)
            .await
            .map_err(|e| SearchError::connection(Backend::Meilisearch, e.to_string()))?;
        Ok(key.uid)
    }

    fn sign(
        &self,
        api_key_uid: &str,
        api_key: &str,
        search_rules: &Value,
        expires_at: DateTime<Utc>,
    ) -> Result<String, SearchError> {
        let expires_at = to_offset_datetime(expires_at)?;

        self.client
            .generate_tenant_token(
                api_key_uid.to_string(),
                search_rules.clone(),
                Some(api_key),
                Some(expires_at),
            )
            .map_err(|e| SearchError::validation(format!("tenant token rejected: {}", e)))
    }
}
