//! Gateway configuration and dependency wiring.
//!
//! [`GatewayConfig`] is read once from the environment and handed to
//! [`Dependencies`], which builds the backend clients and the per-index
//! engines from it.

mod dependencies;

pub use dependencies::{Dependencies, MeilisearchHandles};

use std::collections::BTreeMap;
use std::env;

use chrono::Duration;
use tracing::debug;

use crate::GatewayError;
use search_gateway_repository::{EngineKind, IndexFacetConfig, IndexSettings};

/// Default Meilisearch URL.
const DEFAULT_MEILISEARCH_URL: &str = "http://localhost:7700";

/// Default legacy engine URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default tenant token lifetime: 7 days.
const DEFAULT_TOKEN_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Meilisearch URL used by the gateway.
    pub external_url: String,
    /// Meilisearch URL handed to browsers along with tenant tokens.
    pub external_public_url: String,
    /// Key used for writes and settings. Required by the Meilisearch engine.
    pub external_master_key: Option<String>,
    /// Search key that signs tenant tokens.
    pub external_api_key: Option<String>,
    /// Uid of `external_api_key`, looked up on first use when unset.
    pub external_api_key_uid: Option<String>,
    /// Prepended to every logical index name on Meilisearch.
    pub external_index_prefix: String,
    /// Legacy engine URL.
    pub legacy_engine_endpoint: String,
    /// Filterable attributes per logical index.
    pub index_facet_config: IndexFacetConfig,
    /// Index settings applied when provisioning, per logical index.
    pub index_settings: BTreeMap<String, IndexSettings>,
    /// Filter rules forced into tenant tokens, per logical index.
    pub index_search_rules: BTreeMap<String, Vec<String>>,
    /// Tenant token lifetime.
    pub token_expiry: Duration,
    /// Engine serving every index.
    pub engine: EngineKind,
}

impl GatewayConfig {
    /// Load the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SEARCH_ENGINE`: `meilisearch` or `legacy` (default: meilisearch)
    /// - `MEILISEARCH_URL`: Meilisearch URL (default: http://localhost:7700)
    /// - `MEILISEARCH_PUBLIC_URL`: browser-facing URL (default: `MEILISEARCH_URL`)
    /// - `MEILISEARCH_MASTER_KEY`: write key, required with the meilisearch engine
    /// - `MEILISEARCH_API_KEY`: search key for tenant tokens
    /// - `MEILISEARCH_API_KEY_UID`: uid of the search key
    /// - `MEILISEARCH_INDEX_PREFIX`: index uid prefix (default: empty)
    /// - `OPENSEARCH_URL`: legacy engine URL (default: http://localhost:9200)
    /// - `SEARCH_INDEX_FACETS`: JSON object of index name to facet list
    ///   (default: `{"course_info": ["language", "modes", "org"]}`)
    /// - `SEARCH_INDEX_SETTINGS`: JSON object of index name to Meilisearch
    ///   settings (camelCase keys, e.g. `searchableAttributes`) (default: `{}`)
    /// - `SEARCH_INDEX_RULES`: JSON object of index name to filter rules (default: `{}`)
    /// - `SEARCH_TOKEN_EXPIRY_SECONDS`: tenant token lifetime (default: 604800)
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let engine = match var("SEARCH_ENGINE") {
            Some(name) => name
                .parse::<EngineKind>()
                .map_err(|e| GatewayError::config(e.to_string()))?,
            None => EngineKind::default(),
        };

        let external_url = var("MEILISEARCH_URL").unwrap_or_else(|| DEFAULT_MEILISEARCH_URL.to_string());
        let external_public_url = var("MEILISEARCH_PUBLIC_URL").unwrap_or_else(|| external_url.clone());
        let external_master_key = var("MEILISEARCH_MASTER_KEY");
        if engine == EngineKind::Meilisearch && external_master_key.is_none() {
            return Err(GatewayError::config(
                "MEILISEARCH_MASTER_KEY is required when SEARCH_ENGINE=meilisearch",
            ));
        }

        let index_facet_config = match var("SEARCH_INDEX_FACETS") {
            Some(raw) => IndexFacetConfig::new(parse_string_lists("SEARCH_INDEX_FACETS", &raw)?),
            None => IndexFacetConfig::course_defaults(),
        };
        let index_settings = match var("SEARCH_INDEX_SETTINGS") {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                GatewayError::config(format!("SEARCH_INDEX_SETTINGS is not a JSON object of index settings: {}", e))
            })?,
            None => BTreeMap::new(),
        };
        let index_search_rules = match var("SEARCH_INDEX_RULES") {
            Some(raw) => parse_string_lists("SEARCH_INDEX_RULES", &raw)?,
            None => BTreeMap::new(),
        };

        let token_expiry = match var("SEARCH_TOKEN_EXPIRY_SECONDS") {
            Some(raw) => {
                let seconds: i64 = raw.trim().parse().map_err(|_| {
                    GatewayError::config(format!("SEARCH_TOKEN_EXPIRY_SECONDS is not a number: {}", raw))
                })?;
                if seconds <= 0 {
                    return Err(GatewayError::config(
                        "SEARCH_TOKEN_EXPIRY_SECONDS must be positive",
                    ));
                }
                Duration::try_seconds(seconds).ok_or_else(|| {
                    GatewayError::config(format!(
                        "SEARCH_TOKEN_EXPIRY_SECONDS is out of range: {}",
                        seconds
                    ))
                })?
            }
            None => Duration::seconds(DEFAULT_TOKEN_EXPIRY_SECONDS),
        };

        let config = Self {
            external_url,
            external_public_url,
            external_master_key,
            external_api_key: var("MEILISEARCH_API_KEY"),
            external_api_key_uid: var("MEILISEARCH_API_KEY_UID"),
            external_index_prefix: lookup("MEILISEARCH_INDEX_PREFIX").unwrap_or_default(),
            legacy_engine_endpoint: var("OPENSEARCH_URL")
                .unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
            index_facet_config,
            index_settings,
            index_search_rules,
            token_expiry,
            engine,
        };

        debug!(engine = %config.engine, prefix = %config.external_index_prefix, "Loaded configuration");
        Ok(config)
    }

    /// Settings to provision `index_name` with: the configured settings, with
    /// the facet list as filterable attributes when one is configured.
    pub fn settings_for(&self, index_name: &str) -> IndexSettings {
        self.index_settings
            .get(index_name)
            .cloned()
            .unwrap_or_default()
            .with_facets(self.index_facet_config.facets_for(index_name))
    }

    /// Logical names of every index with facets or settings configured.
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .index_facet_config
            .index_names()
            .chain(self.index_settings.keys().map(String::as_str))
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Parse a JSON object whose values are lists of strings.
fn parse_string_lists(name: &str, raw: &str) -> Result<BTreeMap<String, Vec<String>>, GatewayError> {
    serde_json::from_str(raw)
        .map_err(|e| GatewayError::config(format!("{} is not a JSON object of string lists: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig, GatewayError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("MEILISEARCH_MASTER_KEY", "masterKey")]).unwrap();

        assert_eq!(config.engine, EngineKind::Meilisearch);
        assert_eq!(config.external_url, "http://localhost:7700");
        assert_eq!(config.external_public_url, "http://localhost:7700");
        assert_eq!(config.legacy_engine_endpoint, "http://localhost:9200");
        assert_eq!(config.external_index_prefix, "");
        assert_eq!(config.token_expiry, Duration::days(7));
        assert_eq!(
            config.index_facet_config.facets_for("course_info"),
            ["language", "modes", "org"]
        );
        assert!(config.index_search_rules.is_empty());
        assert!(config.index_settings.is_empty());
        assert!(config.external_api_key.is_none());
    }

    #[test]
    fn test_master_key_required_for_meilisearch() {
        assert!(matches!(load(&[]), Err(GatewayError::ConfigError(_))));

        let config = load(&[("SEARCH_ENGINE", "legacy")]).unwrap();
        assert_eq!(config.engine, EngineKind::Legacy);
        assert!(config.external_master_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("MEILISEARCH_MASTER_KEY", "masterKey"),
            ("MEILISEARCH_URL", "http://meilisearch:7700"),
            ("MEILISEARCH_PUBLIC_URL", "https://search.example.com"),
            ("MEILISEARCH_INDEX_PREFIX", "tutor_"),
            ("SEARCH_INDEX_FACETS", r#"{"course_info": ["org"], "courseware_content": []}"#),
            ("SEARCH_INDEX_RULES", r#"{"course_info": ["enrollment_end > 0"]}"#),
            ("SEARCH_TOKEN_EXPIRY_SECONDS", "3600"),
        ])
        .unwrap();

        assert_eq!(config.external_public_url, "https://search.example.com");
        assert_eq!(config.external_index_prefix, "tutor_");
        assert_eq!(config.index_facet_config.facets_for("course_info"), ["org"]);
        assert_eq!(
            config.index_facet_config.index_names().collect::<Vec<_>>(),
            vec!["course_info", "courseware_content"]
        );
        assert_eq!(config.index_search_rules["course_info"], vec!["enrollment_end > 0"]);
        assert_eq!(config.token_expiry, Duration::hours(1));
    }

    #[test]
    fn test_index_settings() {
        let config = load(&[
            ("MEILISEARCH_MASTER_KEY", "masterKey"),
            ("SEARCH_INDEX_FACETS", r#"{"course_info": ["org"]}"#),
            (
                "SEARCH_INDEX_SETTINGS",
                r#"{
                    "course_info": {"searchableAttributes": ["display_name"], "filterableAttributes": ["ignored"]},
                    "courseware_content": {"sortableAttributes": ["start"]}
                }"#,
            ),
        ])
        .unwrap();

        assert_eq!(config.index_names(), vec!["course_info", "courseware_content"]);

        let course = config.settings_for("course_info");
        assert_eq!(course.searchable_attributes, Some(vec!["display_name".to_string()]));
        assert_eq!(course.filterable_attributes, Some(vec!["org".to_string()]));

        let content = config.settings_for("courseware_content");
        assert_eq!(content.sortable_attributes, Some(vec!["start".to_string()]));
        assert!(content.filterable_attributes.is_none());

        assert!(config.settings_for("unknown").is_empty());
    }

    #[test]
    fn test_invalid_values() {
        let base = ("MEILISEARCH_MASTER_KEY", "masterKey");

        for vars in [
            vec![base, ("SEARCH_ENGINE", "solr")],
            vec![base, ("SEARCH_INDEX_FACETS", "[\"org\"]")],
            vec![base, ("SEARCH_INDEX_RULES", "{\"course_info\": \"org = x\"}")],
            vec![base, ("SEARCH_INDEX_SETTINGS", r#"{"course_info": {"rankingRule": []}}"#)],
            vec![base, ("SEARCH_TOKEN_EXPIRY_SECONDS", "0")],
            vec![base, ("SEARCH_TOKEN_EXPIRY_SECONDS", "soon")],
            vec![base, ("SEARCH_TOKEN_EXPIRY_SECONDS", "9223372036854775807")],
        ] {
            assert!(
                matches!(load(&vars), Err(GatewayError::ConfigError(_))),
                "expected config error for {:?}",
                vars
            );
        }
    }
}
