//! Static facet configuration and its reconciliation against Meilisearch.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::errors::SearchError;
use crate::interfaces::ExternalIndexClient;
use crate::types::TaskReceipt;

/// Facets (filterable attributes) declared per logical index name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexFacetConfig {
    facets: BTreeMap<String, Vec<String>>,
}

impl IndexFacetConfig {
    pub fn new(facets: BTreeMap<String, Vec<String>>) -> Self {
        Self { facets }
    }

    /// The facets used by the course discovery index.
    pub fn course_defaults() -> Self {
        let mut facets = BTreeMap::new();
        facets.insert(
            "course_info".to_string(),
            vec!["language".to_string(), "modes".to_string(), "org".to_string()],
        );
        Self { facets }
    }

    /// Declared facets for an index; empty when the index has none.
    pub fn facets_for(&self, index_name: &str) -> &[String] {
        self.facets
            .get(index_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Logical names of all configured indexes.
    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.facets.keys().map(String::as_str)
    }
}

/// Make the index's filterable attributes match `desired`.
///
/// Attribute order is ignored. Nothing is written when the index already
/// matches or when no facets are declared.
///
/// # Returns
///
/// * `Ok(Some(TaskReceipt))` - The settings update that was enqueued
/// * `Ok(None)` - The index was already in sync
pub async fn reconcile_facets(
    client: &dyn ExternalIndexClient,
    index_uid: &str,
    desired: &[String],
) -> Result<Option<TaskReceipt>, SearchError> {
    if desired.is_empty() {
        return Ok(None);
    }

    let current = client.get_filterable_attributes(index_uid).await?;
    let current_set: BTreeSet<&String> = current.iter().collect();
    let desired_set: BTreeSet<&String> = desired.iter().collect();
    if current_set == desired_set {
        debug!(index_uid = %index_uid, "Filterable attributes already in sync");
        return Ok(None);
    }

    info!(
        index_uid = %index_uid,
        current = ?current,
        desired = ?desired,
        "Reconciling filterable attributes"
    );
    client
        .set_filterable_attributes(index_uid, desired)
        .await
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::types::{ApiKey, ApiKeyRequest, IndexSettings};
    use search_gateway_shared::RawSearchResponse;
    use serde_json::{Map, Value};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct SettingsOnlyClient {
        filterable: Arc<Mutex<Vec<String>>>,
        updates: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl SettingsOnlyClient {
        fn with(attributes: &[&str]) -> Self {
            Self {
                filterable: Arc::new(Mutex::new(
                    attributes.iter().map(|s| s.to_string()).collect(),
                )),
                updates: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl ExternalIndexClient for SettingsOnlyClient {
        async fn add_documents(
            &self,
            _index_uid: &str,
            _documents: &[Map<String, Value>],
            _primary_key: &str,
        ) -> Result<TaskReceipt, SearchError> {
            unimplemented!()
        }

        async fn get_filterable_attributes(
            &self,
            _index_uid: &str,
        ) -> Result<Vec<String>, SearchError> {
            Ok(self.filterable.lock().await.clone())
        }

        async fn set_filterable_attributes(
            &self,
            index_uid: &str,
            attributes: &[String],
        ) -> Result<TaskReceipt, SearchError> {
            *self.filterable.lock().await = attributes.to_vec();
            self.updates.lock().await.push(attributes.to_vec());
            Ok(TaskReceipt {
                task_uid: 7,
                index_uid: Some(index_uid.to_string()),
                status: "enqueued".to_string(),
            })
        }

        async fn search(
            &self,
            _index_uid: &str,
            _query: &str,
            _facets: &[String],
        ) -> Result<RawSearchResponse, SearchError> {
            unimplemented!()
        }

        async fn ensure_index(
            &self,
            _index_uid: &str,
            _primary_key: &str,
            _settings: &IndexSettings,
        ) -> Result<(), SearchError> {
            Ok(())
        }

        async fn list_indexes(&self) -> Result<Vec<String>, SearchError> {
            unimplemented!()
        }

        async fn create_key(&self, _request: &ApiKeyRequest) -> Result<ApiKey, SearchError> {
            unimplemented!()
        }

        async fn health_check(&self) -> Result<bool, SearchError> {
            Ok(true)
        }
    }

    #[test]
    fn test_course_defaults() {
        let config = IndexFacetConfig::course_defaults();
        assert_eq!(
            config.facets_for("course_info"),
            ["language", "modes", "org"]
        );
        assert!(config.facets_for("courseware_content").is_empty());
        assert_eq!(config.index_names().collect::<Vec<_>>(), vec!["course_info"]);
    }

    #[tokio::test]
    async fn test_mismatch_is_updated_once() {
        let client = SettingsOnlyClient::with(&["org"]);
        let desired = IndexFacetConfig::course_defaults()
            .facets_for("course_info")
            .to_vec();

        let first = reconcile_facets(&client, "course_info", &desired)
            .await
            .unwrap();
        let second = reconcile_facets(&client, "course_info", &desired)
            .await
            .unwrap();

        assert_eq!(first.map(|t| t.task_uid), Some(7));
        assert!(second.is_none());
        assert_eq!(client.updates.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_order_is_ignored() {
        let client = SettingsOnlyClient::with(&["org", "modes", "language"]);
        let desired = vec!["language".to_string(), "modes".to_string(), "org".to_string()];

        let result = reconcile_facets(&client, "course_info", &desired)
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(client.updates.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_declared_facets_skips_lookup() {
        let client = SettingsOnlyClient::with(&["org"]);
        let result = reconcile_facets(&client, "courseware_content", &[])
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(client.updates.lock().await.is_empty());
    }
}
