//! Request and response types for indexing and administration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Receipt for an asynchronous Meilisearch task.
///
/// Meilisearch enqueues writes and settings updates; the receipt identifies
/// the enqueued task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReceipt {
    /// The Meilisearch task uid.
    pub task_uid: u32,
    /// Index the task applies to, when it applies to one.
    pub index_uid: Option<String>,
    /// Task status at enqueue time, normally `enqueued`.
    pub status: String,
}

/// Result of a batch operation for a single document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOperationResult {
    /// The record's `id`.
    pub document_id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Backend error message if the operation failed.
    pub error: Option<String>,
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// This is what the legacy engine reports for a bulk write and what callers
/// of the indexers receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOperationSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from per-document results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// True when every document was written.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Index settings applied when an index is provisioned.
///
/// Unset fields leave the engine's current value alone. Field names follow
/// the Meilisearch settings API (`searchableAttributes`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IndexSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable_attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayed_attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filterable_attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable_attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking_rules: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_words: Option<Vec<String>>,
}

impl IndexSettings {
    /// True when no setting is specified.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Use `facets` as the filterable attributes unless they are empty.
    pub fn with_facets(mut self, facets: &[String]) -> Self {
        if !facets.is_empty() {
            self.filterable_attributes = Some(facets.to_vec());
        }
        self
    }
}

/// Request to create an API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRequest {
    /// Action names as used by Meilisearch, e.g. `search` or `*`.
    pub actions: Vec<String>,
    /// Index uids or patterns the key is valid for.
    pub indexes: Vec<String>,
    pub description: String,
    /// `None` creates a key that never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKeyRequest {
    /// A key for every action on every index, expiring at `expires_at`.
    pub fn full_access(expires_at: DateTime<Utc>) -> Self {
        Self {
            actions: vec!["*".to_string()],
            indexes: vec!["*".to_string()],
            description: String::new(),
            expires_at: Some(expires_at),
        }
    }
}

/// An API key created by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKey {
    pub key: String,
    pub uid: String,
    pub indexes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}
