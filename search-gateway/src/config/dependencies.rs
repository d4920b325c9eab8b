//! Dependency initialization and wiring for the search gateway.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::GatewayError;
use search_gateway_repository::{
    ApiKey, ApiKeyRequest, DualWriteEngine, EngineKind, ExternalIndexClient, LegacyEngine,
    LegacySearchEngine, MeilisearchClient, OpenSearchLegacyEngine, SearchEngine,
    TenantTokenSigner, TokenIssuer, TokenSettings,
};
use search_gateway_shared::PRIMARY_KEY_FIELD;

/// Container for the initialized backend clients.
pub struct Dependencies {
    config: GatewayConfig,
    legacy: Arc<dyn LegacySearchEngine>,
    /// Present when the Meilisearch engine is selected.
    external: Option<MeilisearchHandles>,
}

/// The Meilisearch client seen through the two roles it plays.
#[derive(Clone)]
pub struct MeilisearchHandles {
    pub client: Arc<dyn ExternalIndexClient>,
    pub signer: Arc<dyn TenantTokenSigner>,
}

impl MeilisearchHandles {
    pub fn new(client: Arc<MeilisearchClient>) -> Self {
        Self {
            client: client.clone(),
            signer: client,
        }
    }
}

impl Dependencies {
    /// Build the clients described by `config`.
    ///
    /// No network calls are made; see [`Dependencies::verify_connections`].
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(GatewayError)` - If a client cannot be built
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        info!(
            engine = %config.engine,
            meilisearch_url = %config.external_url,
            opensearch_url = %config.legacy_engine_endpoint,
            "Initializing dependencies"
        );

        let legacy = OpenSearchLegacyEngine::new(&config.legacy_engine_endpoint)
            .map_err(|e| GatewayError::config(format!("Failed to create OpenSearch client: {}", e)))?;

        let external = match config.engine {
            EngineKind::Meilisearch => {
                let master_key = config.external_master_key.as_deref().ok_or_else(|| {
                    GatewayError::config("MEILISEARCH_MASTER_KEY is required for Meilisearch")
                })?;
                let client = MeilisearchClient::new(&config.external_url, master_key).map_err(
                    |e| GatewayError::config(format!("Failed to create Meilisearch client: {}", e)),
                )?;
                Some(MeilisearchHandles::new(Arc::new(client)))
            }
            EngineKind::Legacy => None,
        };

        Ok(Self::from_parts(config, Arc::new(legacy), external))
    }

    /// Assemble dependencies from already built clients.
    pub fn from_parts(
        config: GatewayConfig,
        legacy: Arc<dyn LegacySearchEngine>,
        external: Option<MeilisearchHandles>,
    ) -> Self {
        Self {
            config,
            legacy,
            external,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Check that every configured backend is reachable and healthy.
    pub async fn verify_connections(&self) -> Result<(), GatewayError> {
        let healthy = self
            .legacy
            .health_check()
            .await
            .map_err(|e| GatewayError::config(format!("OpenSearch health check failed: {}", e)))?;
        if !healthy {
            return Err(GatewayError::config("OpenSearch cluster is unhealthy"));
        }
        info!("OpenSearch connection verified");

        if let Some(external) = &self.external {
            let healthy = external.client.health_check().await.map_err(|e| {
                GatewayError::config(format!("Meilisearch health check failed: {}", e))
            })?;
            if !healthy {
                return Err(GatewayError::config("Meilisearch is unavailable"));
            }
            info!("Meilisearch connection verified");
        }

        Ok(())
    }

    /// Build the engine serving `index_name`.
    pub fn engine(&self, index_name: &str) -> Box<dyn SearchEngine> {
        match &self.external {
            Some(external) => {
                let facets = self
                    .config
                    .index_facet_config
                    .facets_for(index_name)
                    .to_vec();
                Box::new(DualWriteEngine::new(
                    external.client.clone(),
                    self.legacy.clone(),
                    index_name,
                    &self.config.external_index_prefix,
                    facets,
                ))
            }
            None => Box::new(LegacyEngine::new(self.legacy.clone(), index_name)),
        }
    }

    /// Build the tenant token issuer.
    ///
    /// Requires the Meilisearch engine and `MEILISEARCH_API_KEY`.
    pub fn token_issuer(&self) -> Result<TokenIssuer, GatewayError> {
        let external = self.require_external("Tenant tokens")?;
        let api_key = self
            .config
            .external_api_key
            .clone()
            .ok_or_else(|| GatewayError::config("MEILISEARCH_API_KEY is required for tenant tokens"))?;

        Ok(TokenIssuer::new(
            external.signer.clone(),
            TokenSettings {
                public_url: self.config.external_public_url.clone(),
                api_key,
                api_key_uid: self.config.external_api_key_uid.clone(),
                expiry: self.config.token_expiry,
                index_rules: self.config.index_search_rules.clone(),
            },
        ))
    }

    fn require_external(&self, action: &str) -> Result<&MeilisearchHandles, GatewayError> {
        self.external
            .as_ref()
            .ok_or_else(|| GatewayError::config(format!("{} requires the Meilisearch engine", action)))
    }

    /// Create the Meilisearch indexes and apply their settings.
    ///
    /// `only` restricts the run to the given logical names; when empty every
    /// index with facets or settings configured is provisioned. Each index
    /// gets its configured settings, with its facets as filterable attributes.
    ///
    /// # Returns
    ///
    /// The Meilisearch uids that were provisioned.
    pub async fn provision_indexes(&self, only: &[String]) -> Result<Vec<String>, GatewayError> {
        let Some(external) = &self.external else {
            info!("Legacy engine selected; nothing to provision");
            return Ok(Vec::new());
        };

        let names = if only.is_empty() {
            self.config.index_names()
        } else {
            only.to_vec()
        };

        let mut provisioned = Vec::with_capacity(names.len());
        for name in names {
            let settings = self.config.settings_for(&name);
            if settings.filterable_attributes.is_none() {
                warn!(index = %name, "No facets configured for index");
            }

            let uid = format!("{}{}", self.config.external_index_prefix, name);
            external
                .client
                .ensure_index(&uid, PRIMARY_KEY_FIELD, &settings)
                .await?;
            info!(index = %name, index_uid = %uid, "Index provisioned");
            provisioned.push(uid);
        }

        Ok(provisioned)
    }

    /// Uids of every index on Meilisearch.
    pub async fn list_indexes(&self) -> Result<Vec<String>, GatewayError> {
        let external = self.require_external("Listing indexes")?;
        Ok(external.client.list_indexes().await?)
    }

    /// Create a key for every action on every index, valid for the token lifetime.
    pub async fn create_api_key(&self, description: &str) -> Result<ApiKey, GatewayError> {
        let external = self.require_external("Creating API keys")?;
        let expires_at = Utc::now()
            .checked_add_signed(self.config.token_expiry)
            .ok_or_else(|| GatewayError::config("SEARCH_TOKEN_EXPIRY_SECONDS is out of range"))?;

        let request = ApiKeyRequest {
            description: description.to_string(),
            ..ApiKeyRequest::full_access(expires_at)
        };
        let key = external.client.create_key(&request).await?;
        info!(uid = %key.uid, expires_at = ?key.expires_at, "API key created");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use search_gateway_repository::{IndexSettings, SearchError, TaskReceipt};
    use search_gateway_shared::RawSearchResponse;
    use serde_json::{Map, Value};
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockExternal {
        ensured: Mutex<Vec<(String, String, IndexSettings)>>,
        key_requests: Mutex<Vec<ApiKeyRequest>>,
    }

    #[async_trait]
    impl ExternalIndexClient for MockExternal {
        async fn add_documents(
            &self,
            _index_uid: &str,
            _documents: &[Map<String, Value>],
            _primary_key: &str,
        ) -> Result<TaskReceipt, SearchError> {
            unimplemented!()
        }

        async fn get_filterable_attributes(&self, _index_uid: &str) -> Result<Vec<String>, SearchError> {
            unimplemented!()
        }

        async fn set_filterable_attributes(
            &self,
            _index_uid: &str,
            _attributes: &[String],
        ) -> Result<TaskReceipt, SearchError> {
            unimplemented!()
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
            index_uid: &str,
            primary_key: &str,
            settings: &IndexSettings,
        ) -> Result<(), SearchError> {
            self.ensured.lock().await.push((
                index_uid.to_string(),
                primary_key.to_string(),
                settings.clone(),
            ));
            Ok(())
        }

        async fn list_indexes(&self) -> Result<Vec<String>, SearchError> {
            Ok(vec!["tutor_course_info".to_string(), "other".to_string()])
        }

        async fn create_key(&self, request: &ApiKeyRequest) -> Result<ApiKey, SearchError> {
            self.key_requests.lock().await.push(request.clone());
            Ok(ApiKey {
                key: "created-key".to_string(),
                uid: "created-uid".to_string(),
                indexes: request.indexes.clone(),
                expires_at: request.expires_at,
            })
        }

        async fn health_check(&self) -> Result<bool, SearchError> {
            Ok(true)
        }
    }

    struct MockSigner;

    #[async_trait]
    impl TenantTokenSigner for MockSigner {
        async fn api_key_uid(&self, _api_key: &str) -> Result<String, SearchError> {
            Ok("uid".to_string())
        }

        fn sign(
            &self,
            _api_key_uid: &str,
            _api_key: &str,
            _search_rules: &Value,
            _expires_at: DateTime<Utc>,
        ) -> Result<String, SearchError> {
            Ok("token".to_string())
        }
    }

    fn with_mock(vars: &[(&str, &str)]) -> (Arc<MockExternal>, Dependencies) {
        let external = Arc::new(MockExternal::default());
        let legacy = OpenSearchLegacyEngine::new("http://localhost:9200").unwrap();
        let deps = Dependencies::from_parts(
            config(vars),
            Arc::new(legacy),
            Some(MeilisearchHandles {
                client: external.clone(),
                signer: Arc::new(MockSigner),
            }),
        );
        (external, deps)
    }

    fn config(vars: &[(&str, &str)]) -> GatewayConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_meilisearch_engine() {
        let deps = Dependencies::new(config(&[
            ("MEILISEARCH_MASTER_KEY", "masterKey"),
            ("MEILISEARCH_API_KEY", "searchKey"),
        ]))
        .unwrap();

        assert_eq!(deps.engine("course_info").index_name(), "course_info");
        assert!(deps.token_issuer().is_ok());
    }

    #[test]
    fn test_token_issuer_requires_api_key() {
        let deps = Dependencies::new(config(&[("MEILISEARCH_MASTER_KEY", "masterKey")])).unwrap();
        assert!(matches!(
            deps.token_issuer(),
            Err(GatewayError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_legacy_engine() {
        let deps = Dependencies::new(config(&[("SEARCH_ENGINE", "legacy")])).unwrap();

        assert_eq!(deps.engine("courseware_content").index_name(), "courseware_content");
        assert!(deps.token_issuer().is_err());
        assert!(deps.provision_indexes(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_invalid_legacy_url() {
        let result = Dependencies::new(config(&[
            ("SEARCH_ENGINE", "legacy"),
            ("OPENSEARCH_URL", "not a url"),
        ]));
        assert!(matches!(result, Err(GatewayError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_provision_applies_index_settings() {
        let (external, deps) = with_mock(&[
            ("MEILISEARCH_MASTER_KEY", "masterKey"),
            ("MEILISEARCH_INDEX_PREFIX", "tutor_"),
            (
                "SEARCH_INDEX_SETTINGS",
                r#"{"courseware_content": {"searchableAttributes": ["display_name", "content"]}}"#,
            ),
        ]);

        let provisioned = deps.provision_indexes(&[]).await.unwrap();
        assert_eq!(provisioned, vec!["tutor_course_info", "tutor_courseware_content"]);

        let ensured = external.ensured.lock().await;
        assert_eq!(ensured[0].0, "tutor_course_info");
        assert_eq!(ensured[0].1, PRIMARY_KEY_FIELD);
        assert_eq!(
            ensured[0].2.filterable_attributes,
            Some(vec!["language".to_string(), "modes".to_string(), "org".to_string()])
        );
        assert_eq!(ensured[1].0, "tutor_courseware_content");
        assert_eq!(
            ensured[1].2.searchable_attributes,
            Some(vec!["display_name".to_string(), "content".to_string()])
        );
        assert!(ensured[1].2.filterable_attributes.is_none());
    }

    #[tokio::test]
    async fn test_provision_only_named_indexes() {
        let (external, deps) = with_mock(&[("MEILISEARCH_MASTER_KEY", "masterKey")]);

        let provisioned = deps
            .provision_indexes(&["courseware_content".to_string()])
            .await
            .unwrap();

        assert_eq!(provisioned, vec!["courseware_content"]);
        assert_eq!(external.ensured.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_list_indexes() {
        let (_external, deps) = with_mock(&[("MEILISEARCH_MASTER_KEY", "masterKey")]);
        assert_eq!(
            deps.list_indexes().await.unwrap(),
            vec!["tutor_course_info", "other"]
        );
    }

    #[tokio::test]
    async fn test_create_api_key_expires_with_token_lifetime() {
        let (external, deps) = with_mock(&[
            ("MEILISEARCH_MASTER_KEY", "masterKey"),
            ("SEARCH_TOKEN_EXPIRY_SECONDS", "3600"),
        ]);

        let before = Utc::now();
        let key = deps.create_api_key("gateway").await.unwrap();

        assert_eq!(key.uid, "created-uid");
        let requests = external.key_requests.lock().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].actions, vec!["*"]);
        assert_eq!(requests[0].indexes, vec!["*"]);
        assert_eq!(requests[0].description, "gateway");
        let expires_at = requests[0].expires_at.unwrap();
        assert!(expires_at >= before + Duration::hours(1));
        assert!(expires_at <= Utc::now() + Duration::hours(1));
    }

    #[tokio::test]
    async fn test_key_and_listing_require_meilisearch() {
        let deps = Dependencies::new(config(&[("SEARCH_ENGINE", "legacy")])).unwrap();

        assert!(matches!(deps.list_indexes().await, Err(GatewayError::ConfigError(_))));
        assert!(matches!(
            deps.create_api_key("gateway").await,
            Err(GatewayError::ConfigError(_))
        ));
    }
}
