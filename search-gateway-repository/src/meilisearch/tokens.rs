//! Tenant tokens for browser-side search.
//!
//! A tenant token is a JWT, signed with a Meilisearch API key, that restricts
//! which indexes a user may query and which filters are forced on every
//! query. Signing is done by the SDK; this module composes the search rules
//! and packages the token for the frontend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::errors::SearchError;

/// Engine name reported to the frontend.
pub const SEARCH_ENGINE_NAME: &str = "meilisearch";

/// Signs tenant tokens.
#[async_trait]
pub trait TenantTokenSigner: Send + Sync {
    /// Resolve the uid of an API key.
    async fn api_key_uid(&self, api_key: &str) -> Result<String, SearchError>;

    /// Sign a token restricted to `search_rules`.
    fn sign(
        &self,
        api_key_uid: &str,
        api_key: &str,
        search_rules: &Value,
        expires_at: DateTime<Utc>,
    ) -> Result<String, SearchError>;
}

/// Combine each index's configured rules with request-specific rules.
///
/// Returns `{index: {"filter": "<rule> AND <rule>"}}` for every configured
/// index.
pub fn compose_search_rules(
    index_rules: &BTreeMap<String, Vec<String>>,
    extra_rules: &[String],
) -> Value {
    let rules: Map<String, Value> = index_rules
        .iter()
        .map(|(index, rules)| {
            let filter = rules
                .iter()
                .chain(extra_rules)
                .cloned()
                .collect::<Vec<_>>()
                .join(" AND ");
            (index.clone(), json!({ "filter": filter }))
        })
        .collect();
    Value::Object(rules)
}

/// Token handed to an authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserToken {
    pub url: String,
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub search_engine: String,
    pub index_search_rules: Value,
}

/// Settings for [`TokenIssuer`].
#[derive(Debug, Clone)]
pub struct TokenSettings {
    /// URL the browser uses to reach Meilisearch.
    pub public_url: String,
    /// Search API key that signs the tokens.
    pub api_key: String,
    /// Known uid of `api_key`; resolved on first use when absent.
    pub api_key_uid: Option<String>,
    /// Lifetime of each token.
    pub expiry: Duration,
    /// Per-index filter rules.
    pub index_rules: BTreeMap<String, Vec<String>>,
}

/// Issues tenant tokens.
pub struct TokenIssuer {
    signer: Arc<dyn TenantTokenSigner>,
    settings: TokenSettings,
    api_key_uid: OnceCell<String>,
}

impl TokenIssuer {
    pub fn new(signer: Arc<dyn TenantTokenSigner>, settings: TokenSettings) -> Self {
        let api_key_uid = match &settings.api_key_uid {
            Some(uid) => OnceCell::new_with(Some(uid.clone())),
            None => OnceCell::new(),
        };
        Self {
            signer,
            settings,
            api_key_uid,
        }
    }

    /// Issue a token whose rules are the configured ones plus `extra_rules`.
    pub async fn issue(&self, extra_rules: &[String]) -> Result<UserToken, SearchError> {
        let uid = self
            .api_key_uid
            .get_or_try_init(|| self.signer.api_key_uid(&self.settings.api_key))
            .await?;

        let rules = compose_search_rules(&self.settings.index_rules, extra_rules);
        let expires_at = Utc::now()
            .checked_add_signed(self.settings.expiry)
            .ok_or_else(|| {
                SearchError::validation(format!(
                    "token expiry {} is out of range",
                    self.settings.expiry
                ))
            })?;
        let token = self
            .signer
            .sign(uid, &self.settings.api_key, &rules, expires_at)?;

        debug!(expires_at = %expires_at, "Issued tenant token");

        Ok(UserToken {
            url: self.settings.public_url.clone(),
            token,
            token_type: "Bearer".to_string(),
            expires_at,
            search_engine: SEARCH_ENGINE_NAME.to_string(),
            index_search_rules: rules,
        })
    }
}
