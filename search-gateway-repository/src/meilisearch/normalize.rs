//! Meilisearch result normalization.
//!
//! Reshapes a native Meilisearch search response into the envelope returned
//! by the legacy Elasticsearch-based search API:
//!
//! ```text
//! { "took": 13, "total": 1, "max_score": 0.86,
//!   "results": [{"_id": ..., "_index": ..., "_type": "_doc", "data": {...}}],
//!   "aggs": {"org": {"terms": {"OpenedX": 1}, "total": 1.0, "other": 0}} }
//! ```

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::SearchError;
use search_gateway_shared::{
    Aggregation, NormalizedHit, NormalizedResponse, RawSearchResponse, DOCUMENT_TYPE, ID_FIELD,
    PRIMARY_KEY_FIELD,
};

/// Convert a Meilisearch response into the legacy envelope.
///
/// `index_name` is the logical (unprefixed) index the query targeted. The
/// ranking score and the derived primary key are stripped from every hit.
///
/// # Errors
///
/// Returns [`SearchError::ContractViolation`] when a hit lacks its ranking
/// score, `_pk` or `id`, or when the response carries no hit count.
pub fn process_results(
    raw: &RawSearchResponse,
    index_name: &str,
) -> Result<NormalizedResponse, SearchError> {
    let total = raw
        .estimated_total_hits
        .or(raw.total_hits)
        .ok_or_else(|| SearchError::contract_violation("response has no hit count"))?;

    let mut max_score = 0.0_f64;
    let mut results = Vec::with_capacity(raw.hits.len());

    for (position, hit) in raw.hits.iter().enumerate() {
        let score = hit.ranking_score.ok_or_else(|| {
            SearchError::contract_violation(format!("hit {} has no _rankingScore", position))
        })?;

        let mut data = hit.fields.clone();
        if data.remove(PRIMARY_KEY_FIELD).is_none() {
            return Err(SearchError::contract_violation(format!(
                "hit {} has no {} field",
                position, PRIMARY_KEY_FIELD
            )));
        }
        let id = match data.get(ID_FIELD) {
            Some(Value::String(id)) => id.clone(),
            _ => {
                return Err(SearchError::contract_violation(format!(
                    "hit {} has no string id",
                    position
                )))
            }
        };

        max_score = max_score.max(score);
        results.push(NormalizedHit {
            id,
            index: index_name.to_string(),
            doc_type: DOCUMENT_TYPE.to_string(),
            data,
            score: None,
        });
    }

    Ok(NormalizedResponse {
        took: raw.processing_time_ms,
        total,
        max_score,
        results,
        aggs: aggregations(raw),
    })
}

fn aggregations(raw: &RawSearchResponse) -> BTreeMap<String, Aggregation> {
    let Some(distribution) = &raw.facet_distribution else {
        return BTreeMap::new();
    };

    distribution
        .iter()
        .map(|(facet, terms)| {
            let total = terms.values().sum::<u64>() as f64;
            (
                facet.clone(),
                Aggregation {
                    terms: terms.clone(),
                    total,
                    other: 0,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::id_to_primary_key;
    use serde_json::json;

    fn raw(value: Value) -> RawSearchResponse {
        serde_json::from_value(value).unwrap()
    }

    fn two_hits() -> RawSearchResponse {
        raw(json!({
            "hits": [
                {
                    "id": "id1",
                    "_pk": id_to_primary_key("id1"),
                    "title": "title 1",
                    "_rankingScore": 0.8
                },
                {
                    "id": "id2",
                    "_pk": id_to_primary_key("id2"),
                    "title": "title 2",
                    "_rankingScore": 0.2
                }
            ],
            "query": "demo",
            "processingTimeMs": 14,
            "limit": 20,
            "offset": 0,
            "estimatedTotalHits": 2
        }))
    }

    #[test]
    fn test_hits_are_wrapped() {
        let processed = process_results(&two_hits(), "index_name").unwrap();

        assert_eq!(processed.took, 14);
        assert_eq!(processed.total, 2);
        assert_eq!(processed.max_score, 0.8);
        assert_eq!(processed.results.len(), 2);
        assert!(processed.aggs.is_empty());

        assert_eq!(
            serde_json::to_value(&processed.results[0]).unwrap(),
            json!({
                "_id": "id1",
                "_index": "index_name",
                "_type": "_doc",
                "data": {"id": "id1", "title": "title 1"}
            })
        );
        assert_eq!(
            serde_json::to_value(&processed.results[1]).unwrap(),
            json!({
                "_id": "id2",
                "_index": "index_name",
                "_type": "_doc",
                "data": {"id": "id2", "title": "title 2"}
            })
        );
    }

    #[test]
    fn test_max_score_is_order_independent() {
        let mut response = two_hits();
        response.hits.reverse();

        let processed = process_results(&response, "index_name").unwrap();
        assert_eq!(processed.max_score, 0.8);
        assert_eq!(processed.results[0].id, "id2");
    }

    #[test]
    fn test_facets_become_aggregations() {
        let response = raw(json!({
            "hits": [],
            "query": "",
            "processingTimeMs": 1,
            "limit": 20,
            "offset": 0,
            "estimatedTotalHits": 0,
            "facetDistribution": {
                "modes": {"audit": 1, "honor": 3},
                "facet2": {"val1": 1, "val2": 2, "val3": 3}
            }
        }));

        let processed = process_results(&response, "index_name").unwrap();

        assert_eq!(
            serde_json::to_value(&processed.aggs["modes"]).unwrap(),
            json!({"terms": {"audit": 1, "honor": 3}, "total": 4.0, "other": 0})
        );
        assert_eq!(processed.aggs["facet2"].total, 6.0);
        assert_eq!(processed.aggs.len(), 2);
    }

    #[test]
    fn test_empty_response() {
        let response = raw(json!({
            "hits": [],
            "processingTimeMs": 0,
            "estimatedTotalHits": 0
        }));

        let processed = process_results(&response, "course_info").unwrap();
        assert_eq!(processed.max_score, 0.0);
        assert!(processed.results.is_empty());
        assert!(processed.aggs.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let response = two_hits();
        let first = process_results(&response, "course_info").unwrap();
        let second = process_results(&response, "course_info").unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_missing_ranking_score_is_rejected() {
        let response = raw(json!({
            "hits": [{"id": "id1", "_pk": id_to_primary_key("id1")}],
            "processingTimeMs": 1,
            "estimatedTotalHits": 1
        }));

        let err = process_results(&response, "course_info").unwrap_err();
        assert!(matches!(err, SearchError::ContractViolation(_)));
    }

    #[test]
    fn test_missing_primary_key_is_rejected() {
        let response = raw(json!({
            "hits": [{"id": "id1", "_rankingScore": 0.5}],
            "processingTimeMs": 1,
            "estimatedTotalHits": 1
        }));

        let err = process_results(&response, "course_info").unwrap_err();
        assert!(matches!(err, SearchError::ContractViolation(_)));
    }

    #[test]
    fn test_total_hits_used_for_paged_responses() {
        let response = raw(json!({
            "hits": [],
            "processingTimeMs": 2,
            "page": 1,
            "hitsPerPage": 20,
            "totalHits": 57,
            "totalPages": 3
        }));

        assert_eq!(process_results(&response, "course_info").unwrap().total, 57);
    }
}
