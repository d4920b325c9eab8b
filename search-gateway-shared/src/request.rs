//! Search and indexing parameters following the legacy engine's contract.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

/// A filter clause from the legacy `filter_dictionary`.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// The field must equal this value.
    Term(Value),
    /// The field must equal one of these values.
    Terms(Vec<Value>),
    /// The field must fall within the bounds; a missing bound is open.
    Range {
        lower: Option<Value>,
        upper: Option<Value>,
    },
}

/// Search request with the legacy keyword-argument contract.
///
/// `size` and `from` are the pass-through pagination arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub query_string: Option<String>,
    pub field_dictionary: BTreeMap<String, Value>,
    pub filter_dictionary: BTreeMap<String, FilterValue>,
    pub exclude_dictionary: BTreeMap<String, Value>,
    pub aggregation_terms: BTreeMap<String, Value>,
    pub exclude_ids: Vec<String>,
    pub use_field_match: bool,
    pub size: Option<usize>,
    pub from: Option<usize>,
}

impl SearchRequest {
    /// Create a request for the given query text.
    pub fn new(query_string: impl Into<String>) -> Self {
        Self {
            query_string: Some(query_string.into()),
            ..Default::default()
        }
    }

    /// Request an aggregation on the given field.
    pub fn with_aggregation(mut self, field: impl Into<String>) -> Self {
        self.aggregation_terms
            .insert(field.into(), Value::Object(Default::default()));
        self
    }

    /// Require an exact field match.
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field_dictionary.insert(field.into(), value.into());
        self
    }

    /// Add a filter clause.
    pub fn with_filter(mut self, field: impl Into<String>, filter: FilterValue) -> Self {
        self.filter_dictionary.insert(field.into(), filter);
        self
    }

    /// Exclude documents whose field equals the value.
    pub fn with_exclude(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.exclude_dictionary.insert(field.into(), value.into());
        self
    }

    /// Set pagination.
    pub fn with_page(mut self, from: usize, size: usize) -> Self {
        self.from = Some(from);
        self.size = Some(size);
        self
    }

    /// Names of the requested facets, in a stable order.
    pub fn facet_names(&self) -> Vec<String> {
        self.aggregation_terms.keys().cloned().collect()
    }
}

/// Extra parameters forwarded verbatim to the legacy indexing entrypoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexParams {
    /// Per-request timeout. No default is imposed when absent.
    pub request_timeout: Option<Duration>,
}

impl IndexParams {
    pub fn with_request_timeout(timeout: Duration) -> Self {
        Self {
            request_timeout: Some(timeout),
        }
    }
}
