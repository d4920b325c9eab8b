//! Result envelopes.
//!
//! [`RawSearchResponse`] mirrors the JSON body Meilisearch returns for a
//! search. [`NormalizedResponse`] is the shape legacy consumers expect from
//! the Elasticsearch-based search API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document type tag reported on every normalized hit.
pub const DOCUMENT_TYPE: &str = "_doc";

/// A single Meilisearch hit: the stored document plus its ranking score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    #[serde(
        rename = "_rankingScore",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ranking_score: Option<f64>,

    /// Stored document fields, including `id` and `_pk`.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Native Meilisearch search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSearchResponse {
    pub hits: Vec<RawHit>,
    #[serde(default)]
    pub query: String,
    pub processing_time_ms: u64,
    /// Present for offset/limit pagination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_total_hits: Option<u64>,
    /// Present for page/hitsPerPage pagination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_hits: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet_distribution: Option<BTreeMap<String, BTreeMap<String, u64>>>,
}

/// Aggregation bucket set for one facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Facet value to document count.
    pub terms: BTreeMap<String, u64>,
    /// Sum of the counts in `terms`.
    pub total: f64,
    /// Count of documents whose values were not returned.
    pub other: u64,
}

/// A hit wrapped the way the legacy engine reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    pub data: Map<String, Value>,
    /// Only the legacy engine reports per-hit scores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Legacy-compatible search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub took: u64,
    pub total: u64,
    pub max_score: f64,
    pub results: Vec<NormalizedHit>,
    pub aggs: BTreeMap<String, Aggregation>,
}

impl NormalizedResponse {
    /// A response with no hits and no aggregations.
    pub fn empty() -> Self {
        Self {
            took: 0,
            total: 0,
            max_score: 0.0,
            results: Vec::new(),
            aggs: BTreeMap::new(),
        }
    }
}
