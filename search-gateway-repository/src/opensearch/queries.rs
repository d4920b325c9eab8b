//! OpenSearch query builders.
//!
//! This module turns a legacy [`SearchRequest`] into an OpenSearch search
//! body.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use search_gateway_shared::{FilterValue, SearchRequest};

/// Fields searched by free-text queries.
const TEXT_FIELDS: &[&str] = &["content.*"];

/// Maximum number of buckets returned per aggregation.
pub const AGGREGATION_BUCKET_LIMIT: usize = 100;

/// Characters with special meaning in `query_string` syntax.
const RESERVED_CHARACTERS: &[char] = &[
    '+', '-', '=', '&', '|', '>', '<', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?',
    ':', '\\', '/',
];

/// Build an OpenSearch search body from a legacy search request.
///
/// The query handles:
/// - Free text over `content.*`, with reserved characters escaped
/// - Exact (or analysed, with `use_field_match`) field matches
/// - Filters that also accept documents lacking the field
/// - Excluded values and excluded document ids
/// - One `terms` aggregation per requested aggregation term
pub fn build_search_query(request: &SearchRequest) -> Value {
    let mut must = Vec::new();
    let mut filter = Vec::new();
    let mut must_not = Vec::new();

    if let Some(text) = request.query_string.as_deref().filter(|q| !q.trim().is_empty()) {
        must.push(build_text_query(text));
    }

    for (field, value) in &request.field_dictionary {
        if request.use_field_match {
            must.push(json!({ "match": { field: value } }));
        } else {
            must.push(term_clause(field, value));
        }
    }

    for (field, value) in &request.filter_dictionary {
        filter.push(build_filter_clause(field, value));
    }

    for (field, value) in &request.exclude_dictionary {
        must_not.push(term_clause(field, value));
    }

    if !request.exclude_ids.is_empty() {
        must_not.push(json!({ "ids": { "values": request.exclude_ids } }));
    }

    if must.is_empty() {
        must.push(json!({ "match_all": {} }));
    }

    let mut body = json!({
        "query": {
            "bool": {
                "must": must,
                "filter": filter,
                "must_not": must_not
            }
        }
    });

    if !request.aggregation_terms.is_empty() {
        body["aggs"] = build_aggregations(&request.aggregation_terms);
    }

    body
}

/// Escape `query_string` reserved characters.
pub fn escape_query_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED_CHARACTERS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn build_text_query(text: &str) -> Value {
    json!({
        "query_string": {
            "query": escape_query_string(text),
            "fields": TEXT_FIELDS
        }
    })
}

/// `term` for scalars, `terms` for lists.
fn term_clause(field: &str, value: &Value) -> Value {
    match value {
        Value::Array(values) => json!({ "terms": { field: values } }),
        _ => json!({ "term": { field: value } }),
    }
}

fn build_filter_clause(field: &str, value: &FilterValue) -> Value {
    let matching = match value {
        FilterValue::Term(v) => term_clause(field, v),
        FilterValue::Terms(values) => json!({ "terms": { field: values } }),
        FilterValue::Range { lower, upper } => {
            let mut bounds = Map::new();
            if let Some(lower) = lower {
                bounds.insert("gte".to_string(), lower.clone());
            }
            if let Some(upper) = upper {
                bounds.insert("lte".to_string(), upper.clone());
            }
            json!({ "range": { field: bounds } })
        }
    };

    json!({
        "bool": {
            "should": [
                matching,
                { "bool": { "must_not": { "exists": { "field": field } } } }
            ],
            "minimum_should_match": 1
        }
    })
}

fn build_aggregations(terms: &BTreeMap<String, Value>) -> Value {
    let aggs: Map<String, Value> = terms
        .keys()
        .map(|name| {
            (
                name.clone(),
                json!({ "terms": { "field": name, "size": AGGREGATION_BUCKET_LIMIT } }),
            )
        })
        .collect();
    Value::Object(aggs)
}
