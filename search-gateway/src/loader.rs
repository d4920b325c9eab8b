//! Bulk loading of records into a search engine.
//!
//! Records are read from JSON Lines, one object per line, and written to a
//! [`SearchEngine`] in fixed-size batches.

use std::collections::BTreeMap;
use std::io::BufRead;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::GatewayError;
use search_gateway_repository::{BatchOperationSummary, SearchEngine};
use search_gateway_shared::{IndexParams, SourceRecord};

/// Default number of records per write.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration for the record loader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of records sent in one write.
    pub batch_size: usize,
    /// Parameters passed through to every write.
    pub params: IndexParams,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            params: IndexParams::default(),
        }
    }
}

/// Parse `field=value` pairs separated by commas.
///
/// An empty string means no filters.
pub fn parse_filters(raw: &str) -> Result<BTreeMap<String, String>, GatewayError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((field, value)) if !field.trim().is_empty() => {
                Ok((field.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(GatewayError::config(format!(
                "filter must look like field=value: {}",
                pair
            ))),
        })
        .collect()
}

/// True when every filter names a scalar field whose text equals the filter value.
fn matches_filters(object: &Map<String, Value>, filters: &BTreeMap<String, String>) -> bool {
    filters.iter().all(|(field, expected)| match object.get(field) {
        Some(Value::String(s)) => s == expected,
        Some(other @ (Value::Number(_) | Value::Bool(_))) => other.to_string() == *expected,
        _ => false,
    })
}

/// Read JSON Lines records, keeping those that match `filters`.
///
/// Blank lines are skipped. Line numbers in errors start at 1.
pub fn read_records<R: BufRead>(
    reader: R,
    filters: &BTreeMap<String, String>,
) -> Result<Vec<SourceRecord>, GatewayError> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let number = i + 1;

        let object = match serde_json::from_str::<Value>(&line) {
            Ok(Value::Object(object)) => object,
            Ok(_) => return Err(GatewayError::invalid_record(number, "not a JSON object")),
            Err(e) => return Err(GatewayError::invalid_record(number, e.to_string())),
        };
        if !matches_filters(&object, filters) {
            skipped += 1;
            continue;
        }

        let record = SourceRecord::try_from(Value::Object(object))
            .map_err(|e| GatewayError::invalid_record(number, e.to_string()))?;
        records.push(record);
    }

    debug!(read = records.len(), skipped, "Read records");
    Ok(records)
}

/// Loader that writes records to one index in batches.
pub struct RecordLoader {
    engine: Box<dyn SearchEngine>,
    config: LoaderConfig,
}

impl RecordLoader {
    /// Create a loader with the default configuration.
    pub fn new(engine: Box<dyn SearchEngine>) -> Self {
        Self::with_config(engine, LoaderConfig::default())
    }

    /// Create a loader with custom configuration.
    pub fn with_config(engine: Box<dyn SearchEngine>, config: LoaderConfig) -> Self {
        Self { engine, config }
    }

    /// Write `records` and combine the per-batch summaries.
    ///
    /// Stops at the first batch the engine fails; earlier batches stay written.
    #[instrument(skip(self, records), fields(index = %self.engine.index_name(), record_count = records.len()))]
    pub async fn load(&self, records: &[SourceRecord]) -> Result<BatchOperationSummary, GatewayError> {
        if self.config.batch_size == 0 {
            return Err(GatewayError::config("batch size must be positive"));
        }

        let mut results = Vec::with_capacity(records.len());
        for (batch, chunk) in records.chunks(self.config.batch_size).enumerate() {
            info!(batch, count = chunk.len(), "Writing batch");
            let summary = self.engine.index(chunk, &self.config.params).await?;
            if !summary.is_complete() {
                warn!(batch, failed = summary.failed, "Documents rejected in batch");
            }
            results.extend(summary.results);
        }

        let summary = BatchOperationSummary::from_results(results);
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Load complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use search_gateway_repository::{BatchOperationResult, SearchError};
    use search_gateway_shared::{FieldValue, NormalizedResponse, SearchRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockEngine {
        batches: Mutex<Vec<Vec<String>>>,
        timeouts: Mutex<Vec<Option<Duration>>>,
        /// Zero-based batch that fails, if any.
        fail_batch: Option<usize>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchEngine for MockEngine {
        fn index_name(&self) -> &str {
            "course_info"
        }

        async fn index(
            &self,
            records: &[SourceRecord],
            params: &IndexParams,
        ) -> Result<BatchOperationSummary, SearchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_batch == Some(call) {
                return Err(SearchError::validation("rejected"));
            }
            self.batches
                .lock()
                .await
                .push(records.iter().map(|r| r.id().to_string()).collect());
            self.timeouts.lock().await.push(params.request_timeout);
            Ok(BatchOperationSummary::from_results(
                records
                    .iter()
                    .map(|r| BatchOperationResult {
                        document_id: r.id().to_string(),
                        success: r.id() != "bad",
                        error: (r.id() == "bad").then(|| "mapper_parsing_exception".to_string()),
                    })
                    .collect(),
            ))
        }

        async fn search(&self, _request: &SearchRequest) -> Result<NormalizedResponse, SearchError> {
            unimplemented!()
        }
    }

    /// Engine handle that lets the test inspect the mock after the loader takes ownership.
    struct Shared(Arc<MockEngine>);

    #[async_trait]
    impl SearchEngine for Shared {
        fn index_name(&self) -> &str {
            self.0.index_name()
        }

        async fn index(
            &self,
            records: &[SourceRecord],
            params: &IndexParams,
        ) -> Result<BatchOperationSummary, SearchError> {
            self.0.index(records, params).await
        }

        async fn search(&self, request: &SearchRequest) -> Result<NormalizedResponse, SearchError> {
            self.0.search(request).await
        }
    }

    fn records(ids: &[&str]) -> Vec<SourceRecord> {
        ids.iter()
            .map(|id| SourceRecord::builder(*id).build().unwrap())
            .collect()
    }

    fn loader(engine: &Arc<MockEngine>, batch_size: usize) -> RecordLoader {
        RecordLoader::with_config(
            Box::new(Shared(engine.clone())),
            LoaderConfig {
                batch_size,
                params: IndexParams::with_request_timeout(Duration::from_secs(30)),
            },
        )
    }

    #[test]
    fn test_parse_filters() {
        let filters = parse_filters("org=edX, language = en ,").unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters["org"], "edX");
        assert_eq!(filters["language"], "en");

        assert!(parse_filters("").unwrap().is_empty());
        assert!(matches!(parse_filters("org"), Err(GatewayError::ConfigError(_))));
        assert!(matches!(parse_filters("=edX"), Err(GatewayError::ConfigError(_))));
    }

    #[test]
    fn test_read_records() {
        let input = concat!(
            r#"{"id": "course-v1:edX+DemoX", "org": "edX", "enrollment": 10}"#,
            "\n\n",
            r#"{"id": "course-v1:MITx+6.002x", "org": "MITx"}"#,
            "\n",
        );

        let records = read_records(input.as_bytes(), &BTreeMap::new()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), "course-v1:edX+DemoX");
        assert_eq!(records[0].get("enrollment"), Some(&FieldValue::Int(10)));
        assert_eq!(records[1].get("org").and_then(FieldValue::as_str), Some("MITx"));
    }

    #[test]
    fn test_read_records_applies_filters() {
        let input = concat!(
            r#"{"id": "a", "org": "edX", "self_paced": true}"#,
            "\n",
            r#"{"id": "b", "org": "MITx", "self_paced": true}"#,
            "\n",
            r#"{"id": "c", "org": "edX", "self_paced": false}"#,
            "\n",
            r#"{"id": "d", "self_paced": true}"#,
            "\n",
        );
        let filters = parse_filters("org=edX,self_paced=true").unwrap();

        let records = read_records(input.as_bytes(), &filters).unwrap();

        assert_eq!(records.iter().map(SourceRecord::id).collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_read_records_reports_line() {
        let cases = [
            ("{\"id\": \"a\"}\n{not json}\n", 2),
            ("{\"id\": \"a\"}\n\n[1, 2]\n", 3),
            ("{\"name\": \"no id\"}\n", 1),
            ("{\"id\": \"a\", \"_pk\": \"x\"}\n", 1),
        ];

        for (input, expected) in cases {
            match read_records(input.as_bytes(), &BTreeMap::new()) {
                Err(GatewayError::InvalidRecord { line, .. }) => assert_eq!(line, expected, "{}", input),
                other => panic!("expected invalid record for {:?}, got {:?}", input, other),
            }
        }
    }

    #[tokio::test]
    async fn test_load_in_batches() {
        let engine = Arc::new(MockEngine::default());

        let summary = loader(&engine, 2)
            .load(&records(&["a", "bad", "c", "d", "e"]))
            .await
            .unwrap();

        assert_eq!(summary.total, 5);
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.results[1].document_id, "bad");
        assert_eq!(
            *engine.batches.lock().await,
            vec![vec!["a", "bad"], vec!["c", "d"], vec!["e"]]
        );
        assert!(engine
            .timeouts
            .lock()
            .await
            .iter()
            .all(|t| *t == Some(Duration::from_secs(30))));
    }

    #[tokio::test]
    async fn test_load_nothing() {
        let engine = Arc::new(MockEngine::default());

        let summary = loader(&engine, 2).load(&[]).await.unwrap();

        assert_eq!(summary.total, 0);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_stops_at_failed_batch() {
        let engine = Arc::new(MockEngine {
            fail_batch: Some(1),
            ..MockEngine::default()
        });

        let result = loader(&engine, 1).load(&records(&["a", "b", "c"])).await;

        assert!(matches!(
            result,
            Err(GatewayError::SearchError(SearchError::ValidationError(_)))
        ));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*engine.batches.lock().await, vec![vec!["a"]]);
    }

    #[tokio::test]
    async fn test_zero_batch_size() {
        let engine = Arc::new(MockEngine::default());
        assert!(matches!(
            loader(&engine, 0).load(&records(&["a"])).await,
            Err(GatewayError::ConfigError(_))
        ));
    }
}
