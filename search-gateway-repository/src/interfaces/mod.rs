//! Interface definitions for the search backends.
//!
//! These traits allow dependency injection and swappable backend
//! implementations:
//!
//! - [`ExternalIndexClient`]: the Meilisearch cluster
//! - [`LegacySearchEngine`]: the Elasticsearch-compatible legacy engine
//! - [`SearchEngine`]: what indexing and query-serving code talks to, one per
//!   logical index

mod external_index_client;
mod legacy_search_engine;
mod search_engine;

pub use external_index_client::ExternalIndexClient;
pub use legacy_search_engine::LegacySearchEngine;
pub use search_engine::SearchEngine;
