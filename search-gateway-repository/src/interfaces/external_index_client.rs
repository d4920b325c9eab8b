//! External search engine client trait definition.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::SearchError;
use crate::types::{ApiKey, ApiKeyRequest, IndexSettings, TaskReceipt};
use search_gateway_shared::RawSearchResponse;

/// Abstract interface for the external (Meilisearch) search engine.
///
/// Index arguments are physical index uids, i.e. already prefixed.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait ExternalIndexClient: Send + Sync {
    /// Add or replace documents.
    ///
    /// # Arguments
    ///
    /// * `index_uid` - Physical index uid
    /// * `documents` - Encoded documents
    /// * `primary_key` - Primary key field; only honoured when the index is
    ///   created by this call
    ///
    /// # Returns
    ///
    /// * `Ok(TaskReceipt)` - The enqueued write task
    /// * `Err(SearchError::UpstreamWriteError)` - If the engine rejects the request
    async fn add_documents(
        &self,
        index_uid: &str,
        documents: &[Map<String, Value>],
        primary_key: &str,
    ) -> Result<TaskReceipt, SearchError>;

    /// Fetch the index's filterable attributes.
    async fn get_filterable_attributes(&self, index_uid: &str) -> Result<Vec<String>, SearchError>;

    /// Replace the index's filterable attributes.
    async fn set_filterable_attributes(
        &self,
        index_uid: &str,
        attributes: &[String],
    ) -> Result<TaskReceipt, SearchError>;

    /// Run a search with ranking scores enabled.
    ///
    /// # Arguments
    ///
    /// * `index_uid` - Physical index uid
    /// * `query` - Query text; empty matches everything
    /// * `facets` - Facets whose value distribution should be returned
    ///
    /// # Returns
    ///
    /// * `Ok(RawSearchResponse)` - The engine's native response
    /// * `Err(SearchError)` - If the search fails
    async fn search(
        &self,
        index_uid: &str,
        query: &str,
        facets: &[String],
    ) -> Result<RawSearchResponse, SearchError>;

    /// Create the index if it does not exist, then apply `settings`.
    ///
    /// This should be called when provisioning, not on the request path.
    async fn ensure_index(
        &self,
        index_uid: &str,
        primary_key: &str,
        settings: &IndexSettings,
    ) -> Result<(), SearchError>;

    /// Uids of every index on the engine.
    async fn list_indexes(&self) -> Result<Vec<String>, SearchError>;

    /// Create an API key.
    async fn create_key(&self, request: &ApiKeyRequest) -> Result<ApiKey, SearchError>;

    /// Check if the engine is healthy and reachable.
    async fn health_check(&self) -> Result<bool, SearchError>;
}
